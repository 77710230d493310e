//! Process settings
//!
//! Settings come from a TOML file (`--config`) or from `SUBSTATION_*`
//! environment variables. They are the environment-level defaults only:
//! the stored `config:substore` record takes priority over `substore_url`
//! and `backend_prefix` when the sync engine resolves the upstream.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Settings Type
// ============================================================================

/// Environment-level configuration for the process
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    /// Upstream base URL, e.g. "https://sub.example.com".
    /// Env: `SUBSTATION_SUBSTORE_URL`
    #[serde(default)]
    pub substore_url: Option<String>,

    /// Path prefix in front of the upstream `/api` routes.
    /// Env: `SUBSTATION_BACKEND_PREFIX`
    #[serde(default)]
    pub backend_prefix: String,

    /// Collection name used by the global sync.
    /// Env: `SUBSTATION_COLLECTION`
    #[serde(default)]
    pub collection: Option<String>,

    /// Share token used by the global sync.
    /// Env: `SUBSTATION_TOKEN`
    #[serde(default)]
    pub token: Option<String>,

    /// Upstream fetch timeout in milliseconds.
    /// Env: `SUBSTATION_TIMEOUT_MS`
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Store file path; the literal value "memory" selects the in-memory
    /// store. Env: `SUBSTATION_DATA_FILE`
    #[serde(default = "default_data_file")]
    pub data_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            substore_url: None,
            backend_prefix: String::new(),
            collection: None,
            token: None,
            fetch_timeout_ms: default_fetch_timeout_ms(),
            data_file: default_data_file(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings TOML")
    }

    /// Load settings from file path
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Build settings from `SUBSTATION_*` environment variables
    pub fn from_env() -> Self {
        let fetch_timeout_ms = std::env::var("SUBSTATION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_fetch_timeout_ms);

        Self {
            substore_url: env_nonempty("SUBSTATION_SUBSTORE_URL"),
            backend_prefix: std::env::var("SUBSTATION_BACKEND_PREFIX").unwrap_or_default(),
            collection: env_nonempty("SUBSTATION_COLLECTION"),
            token: env_nonempty("SUBSTATION_TOKEN"),
            fetch_timeout_ms,
            data_file: env_nonempty("SUBSTATION_DATA_FILE").or_else(default_data_file),
        }
    }

    /// Load settings from a TOML file when a path is given, otherwise from
    /// the environment
    pub async fn load(config_path: Option<&str>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                Self::from_file(Path::new(&expanded)).await
            }
            None => Ok(Self::from_env()),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_data_file() -> Option<String> {
    Some("~/.substation/data.json".to_string())
}

// ============================================================================
// Path Utilities
// ============================================================================

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = dirs_home()
    {
        return path.replacen("~", &home, 1);
    }
    path.to_string()
}

/// Get home directory path
pub fn dirs_home() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok()
    }
}
