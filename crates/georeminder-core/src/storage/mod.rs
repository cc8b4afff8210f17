mod config;
pub mod database;

pub use config::{Config, NotificationsConfig, RemindersConfig, TrackingConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns `~/.config/georeminder[-dev]/` based on GEOREMINDER_ENV.
///
/// Set GEOREMINDER_ENV=dev to use the development data directory.
/// GEOREMINDER_HOME replaces `~/.config` as the base directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = match std::env::var_os("GEOREMINDER_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config"),
    };

    let env = std::env::var("GEOREMINDER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("georeminder-dev")
    } else {
        base_dir.join("georeminder")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
