mod cipher;
mod config;
pub mod database;
pub mod keys;
mod kv;
pub mod settings;

pub use config::{Config, LoggingConfig, NotificationsConfig, ReminderDefaults, SecurityConfig};
pub use database::SecureStore;
pub use keys::{load_master_key, KeySource, MasterKey};
pub use kv::{KvStore, MemoryStore};
pub use settings::{ReminderConfig, SettingKey, Settings, ThemeMode};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory.
///
/// `ANIMA_DATA_DIR` wins when set. Otherwise `~/.config/anima[-dev]/`, with
/// `ANIMA_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ANIMA_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("ANIMA_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("anima-dev")
            } else {
                base_dir.join("anima")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
