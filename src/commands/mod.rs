pub mod events;
pub mod populate;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};

use rota::config::Config;
use rota::storage::SqliteStore;

// Re-export command functions for convenience
pub use events::{override_events, swap, OverrideParams};
pub use populate::{populate, preview};
pub use run::run;

/// Load and validate configuration from `path`, or from the environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?,
        None => Config::from_env().context("Failed to read configuration from environment")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database.sqlite_path).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database.sqlite_path.display()
        )
    })
}
