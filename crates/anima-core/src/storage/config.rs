//! TOML-based application configuration.
//!
//! Holds host-level preferences that are not secret and not per-user state:
//! - Default reminder message
//! - Notification permission and title
//! - Lockout policy and master key source
//! - Log level
//!
//! Configuration is stored at `~/.config/anima/config.toml`. Per-user state
//! (reminder time, PIN, lockout counters) lives in the encrypted settings
//! store instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use super::keys::KeySource;
use super::settings::DEFAULT_REMINDER_MESSAGE;
use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.toml";

/// Reminder defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDefaults {
    #[serde(default = "default_message")]
    pub default_message: String,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Host-level notification permission. When false, reminders keep
    /// recurring but nothing is shown.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_title")]
    pub title: String,
}

/// Authentication and at-rest protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    /// Whether a standing PIN lockout also blocks biometric unlock.
    #[serde(default = "default_true")]
    pub biometric_honors_lockout: bool,
    #[serde(default)]
    pub key_source: KeySource,
    #[serde(default = "default_key_env_var")]
    pub key_env_var: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "anima_core=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/anima/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub reminder: ReminderDefaults,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_message() -> String {
    DEFAULT_REMINDER_MESSAGE.into()
}
fn default_true() -> bool {
    true
}
fn default_title() -> String {
    "Anima".into()
}
fn default_max_failed_attempts() -> u32 {
    3
}
fn default_lockout_secs() -> u64 {
    60
}
fn default_key_env_var() -> String {
    "ANIMA_MASTER_KEY".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ReminderDefaults {
    fn default() -> Self {
        Self {
            default_message: default_message(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_title(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: default_max_failed_attempts(),
            lockout_secs: default_lockout_secs(),
            biometric_honors_lockout: true,
            key_source: KeySource::default(),
            key_env_var: default_key_env_var(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot set a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file in the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join(CONFIG_FILE))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject values the lockout policy cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.max_failed_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "security.max_failed_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.security.lockout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "security.lockout_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The value is type-checked
    /// against the existing field; the caller decides when to save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.security.max_failed_attempts, 3);
        assert_eq!(parsed.security.lockout_secs, 60);
        assert_eq!(parsed.security.key_source, KeySource::Keyring);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[security]\nlockout_secs = 300\n").unwrap();
        assert_eq!(parsed.security.lockout_secs, 300);
        assert_eq!(parsed.security.max_failed_attempts, 3);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.reminder.default_message, DEFAULT_REMINDER_MESSAGE);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("security.lockout_secs").as_deref(), Some("60"));
        assert_eq!(cfg.get("security.key_source").as_deref(), Some("keyring"));
        assert!(cfg.get("security.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("notifications.enabled", "false").unwrap();
        cfg.set("security.max_failed_attempts", "5").unwrap();
        cfg.set("notifications.title", "Mood check").unwrap();
        cfg.set("security.key_source", "env").unwrap();
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.security.max_failed_attempts, 5);
        assert_eq!(cfg.notifications.title, "Mood check");
        assert_eq!(cfg.security.key_source, KeySource::Env);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("security.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("notifications.enabled", "not_a_bool").is_err());
        assert!(cfg.set("security.lockout_secs", "-5").is_err());
        assert!(cfg.set("security.key_source", "floppy").is_err());
        assert!(cfg.set("security", "{}").is_err());
    }

    #[test]
    fn set_rejects_zero_threshold() {
        let mut cfg = Config::default();
        assert!(cfg.set("security.max_failed_attempts", "0").is_err());
        assert_eq!(cfg.security.max_failed_attempts, 3);
    }

    #[test]
    fn load_writes_defaults_on_first_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.logging.level, "info");

        let mut changed = cfg.clone();
        changed.set("logging.level", "debug").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().logging.level, "debug");
    }

    #[test]
    fn load_reports_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
