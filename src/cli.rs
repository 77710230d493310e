//! Command-line interface types and prompts

use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Sub-Store subscription sync and user admin", long_about = None)]
pub struct Args {
    #[arg(short, long, help = "Settings TOML path, otherwise SUBSTATION_* env vars")]
    pub config: Option<String>,

    #[arg(short, long, help = "Emit debug log")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sync the global collection
    Sync,

    /// Sync one user's bound share
    SyncUser { username: String },

    /// Sync every user that has a binding
    SyncAll,

    /// Run the auto-sync watcher in the foreground
    Watch {
        #[arg(short, long, help = "Enable auto-sync at this interval first")]
        interval_minutes: Option<u64>,
    },

    /// Show the stored sync result and recent sync log
    Status,

    /// List upstream share tokens and whether each is bound
    Tokens,

    /// User administration
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user
    Add { username: String },

    /// List users with their bindings and last sync
    List,

    /// Bind a user to a collection and share token.
    ///
    /// Prompts for whichever of the two is not passed as a flag.
    Bind {
        username: String,

        #[arg(short, long, help = "Upstream collection name")]
        collection: Option<String>,

        #[arg(short, long, help = "Share token value")]
        token: Option<String>,
    },

    /// Remove a user's binding
    Unbind { username: String },

    /// Print a user's share URL
    Url { username: String },
}

/// Prompt the user to pick one of `options`.
///
/// Returns `None` if the user cancels or the terminal selection fails.
pub fn prompt_select(prompt: &str, options: &[String]) -> Option<String> {
    use dialoguer::{Select, theme::ColorfulTheme};

    if options.is_empty() {
        return None;
    }

    // Add a cancel option at the beginning
    let mut items: Vec<&str> = vec!["(Cancel)"];
    items.extend(options.iter().map(|s| s.as_str()));

    println!();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact();

    match selection {
        Ok(0) => {
            info!("User cancelled selection");
            None
        }
        Ok(idx) => {
            let selected = options[idx - 1].clone();
            info!("User selected: {}", selected);
            Some(selected)
        }
        Err(e) => {
            warn!("Failed to get user selection: {}, cancelling", e);
            None
        }
    }
}
