pub mod cli;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod sync;

pub fn get_version() -> String {
    "0.3.1".to_string()
}
