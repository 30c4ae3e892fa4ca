//! Typed accessors over a [`KvStore`].
//!
//! Each field is its own key and its own write. Readers see either the old or
//! the new value of a field, never a torn one, and every field is valid on its
//! own, so a `ReminderConfig` read during a concurrent save is always usable.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError, ValidationError};

use super::kv::KvStore;

pub const DEFAULT_REMINDER_MESSAGE: &str = "How are you feeling today?";
pub const DEFAULT_REMINDER_HOUR: u32 = 20;
pub const DEFAULT_REMINDER_MINUTE: u32 = 0;

/// Every key the settings store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ThemeMode,
    ReminderEnabled,
    ReminderHour,
    ReminderMinute,
    ReminderMessage,
    Pin,
    FailedAttempts,
    LockUntil,
    LastReminderFired,
}

impl SettingKey {
    pub const ALL: [SettingKey; 9] = [
        SettingKey::ThemeMode,
        SettingKey::ReminderEnabled,
        SettingKey::ReminderHour,
        SettingKey::ReminderMinute,
        SettingKey::ReminderMessage,
        SettingKey::Pin,
        SettingKey::FailedAttempts,
        SettingKey::LockUntil,
        SettingKey::LastReminderFired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::ThemeMode => "theme_mode",
            SettingKey::ReminderEnabled => "reminder_enabled",
            SettingKey::ReminderHour => "reminder_hour",
            SettingKey::ReminderMinute => "reminder_minute",
            SettingKey::ReminderMessage => "reminder_msg",
            SettingKey::Pin => "pin",
            SettingKey::FailedAttempts => "failed_attempts",
            SettingKey::LockUntil => "lock_until",
            SettingKey::LastReminderFired => "last_reminder_fired",
        }
    }
}

/// Daily reminder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub message: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: DEFAULT_REMINDER_HOUR,
            minute: DEFAULT_REMINDER_MINUTE,
            message: DEFAULT_REMINDER_MESSAGE.to_string(),
        }
    }
}

impl ReminderConfig {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_hour(self.hour)?;
        validate_minute(self.minute)
    }
}

/// Appearance preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_u8(self) -> u8 {
        match self {
            ThemeMode::System => 0,
            ThemeMode::Light => 1,
            ThemeMode::Dark => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ThemeMode::System),
            1 => Some(ThemeMode::Light),
            2 => Some(ThemeMode::Dark),
            _ => None,
        }
    }
}

impl FromStr for ThemeMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(ThemeMode::System),
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(ValidationError::InvalidValue {
                field: "theme".into(),
                message: format!("expected system, light or dark, got '{other}'"),
            }),
        }
    }
}

/// Typed view of the settings store.
///
/// Cheap to clone; all clones share the same backing store.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KvStore>,
    default_message: String,
}

impl Settings {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            default_message: DEFAULT_REMINDER_MESSAGE.to_string(),
        }
    }

    /// Override the message returned when none has been saved.
    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.default_message = message;
        }
        self
    }

    // ── Reminder ─────────────────────────────────────────────────────

    pub fn reminder_enabled(&self) -> Result<bool> {
        self.read_parsed(SettingKey::ReminderEnabled, false)
    }

    pub fn set_reminder_enabled(&self, enabled: bool) -> Result<()> {
        self.write(SettingKey::ReminderEnabled, enabled)
    }

    pub fn reminder_hour(&self) -> Result<u32> {
        let hour = self.read_parsed(SettingKey::ReminderHour, DEFAULT_REMINDER_HOUR)?;
        self.in_range(SettingKey::ReminderHour, hour, validate_hour)
    }

    pub fn set_reminder_hour(&self, hour: u32) -> Result<()> {
        validate_hour(hour)?;
        self.write(SettingKey::ReminderHour, hour)
    }

    pub fn reminder_minute(&self) -> Result<u32> {
        let minute = self.read_parsed(SettingKey::ReminderMinute, DEFAULT_REMINDER_MINUTE)?;
        self.in_range(SettingKey::ReminderMinute, minute, validate_minute)
    }

    pub fn set_reminder_minute(&self, minute: u32) -> Result<()> {
        validate_minute(minute)?;
        self.write(SettingKey::ReminderMinute, minute)
    }

    pub fn reminder_message(&self) -> Result<String> {
        Ok(self
            .store
            .get(SettingKey::ReminderMessage.as_str())?
            .unwrap_or_else(|| self.default_message.clone()))
    }

    pub fn set_reminder_message(&self, message: &str) -> Result<()> {
        self.write(SettingKey::ReminderMessage, message)
    }

    /// Read the four reminder fields.
    pub fn reminder_config(&self) -> Result<ReminderConfig> {
        Ok(ReminderConfig {
            enabled: self.reminder_enabled()?,
            hour: self.reminder_hour()?,
            minute: self.reminder_minute()?,
            message: self.reminder_message()?,
        })
    }

    /// Write the four reminder fields, each as its own write. Nothing is
    /// written if the config is out of range.
    pub fn save_reminder_config(&self, config: &ReminderConfig) -> Result<()> {
        config.validate()?;
        self.set_reminder_enabled(config.enabled)?;
        self.set_reminder_hour(config.hour)?;
        self.set_reminder_minute(config.minute)?;
        self.set_reminder_message(&config.message)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Stored PIN digest (`<salt>:<mac>`), `None` until a PIN is set.
    pub fn pin_digest(&self) -> Result<Option<String>> {
        Ok(self.store.get(SettingKey::Pin.as_str())?)
    }

    pub fn set_pin_digest(&self, digest: &str) -> Result<()> {
        self.write(SettingKey::Pin, digest)
    }

    pub fn failed_attempts(&self) -> Result<u32> {
        self.read_parsed(SettingKey::FailedAttempts, 0)
    }

    pub fn set_failed_attempts(&self, attempts: u32) -> Result<()> {
        self.write(SettingKey::FailedAttempts, attempts)
    }

    /// Atomically count one more failed attempt and return the new total.
    pub fn record_failed_attempt(&self) -> Result<u32> {
        let key = SettingKey::FailedAttempts;
        let count = self.store.increment(key.as_str())?;
        Ok(u32::try_from(count).map_err(|_| corrupt(key, count))?)
    }

    /// Lockout end in epoch milliseconds; `0` means not locked.
    pub fn lock_until_ms(&self) -> Result<i64> {
        self.read_parsed(SettingKey::LockUntil, 0)
    }

    pub fn set_lock_until_ms(&self, until_ms: i64) -> Result<()> {
        self.write(SettingKey::LockUntil, until_ms)
    }

    // ── Misc ─────────────────────────────────────────────────────────

    /// When the last reminder fired, epoch milliseconds; `0` if never.
    pub fn last_reminder_fired_ms(&self) -> Result<i64> {
        self.read_parsed(SettingKey::LastReminderFired, 0)
    }

    pub fn set_last_reminder_fired_ms(&self, at_ms: i64) -> Result<()> {
        self.write(SettingKey::LastReminderFired, at_ms)
    }

    pub fn theme_mode(&self) -> Result<ThemeMode> {
        let raw: u8 = self.read_parsed(SettingKey::ThemeMode, ThemeMode::System.as_u8())?;
        ThemeMode::from_u8(raw).ok_or_else(|| corrupt(SettingKey::ThemeMode, raw).into())
    }

    pub fn set_theme_mode(&self, mode: ThemeMode) -> Result<()> {
        self.write(SettingKey::ThemeMode, mode.as_u8())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn read_parsed<T: FromStr>(&self, key: SettingKey, default: T) -> Result<T> {
        match self.store.get(key.as_str())? {
            Some(raw) => raw.trim().parse().map_err(|_| corrupt(key, &raw).into()),
            None => Ok(default),
        }
    }

    fn write(&self, key: SettingKey, value: impl Display) -> Result<()> {
        Ok(self.store.set(key.as_str(), &value.to_string())?)
    }

    fn in_range(
        &self,
        key: SettingKey,
        value: u32,
        check: fn(u32) -> std::result::Result<(), ValidationError>,
    ) -> Result<u32> {
        check(value).map_err(|_| corrupt(key, value))?;
        Ok(value)
    }
}

fn corrupt(key: SettingKey, value: impl Display) -> StoreError {
    StoreError::Corrupt {
        key: key.as_str().to_string(),
        value: value.to_string(),
    }
}

fn validate_hour(hour: u32) -> std::result::Result<(), ValidationError> {
    if hour > 23 {
        return Err(ValidationError::InvalidValue {
            field: "hour".into(),
            message: format!("{hour} is outside 0..=23"),
        });
    }
    Ok(())
}

fn validate_minute(minute: u32) -> std::result::Result<(), ValidationError> {
    if minute > 59 {
        return Err(ValidationError::InvalidValue {
            field: "minute".into(),
            message: format!("{minute} is outside 0..=59"),
        });
    }
    Ok(())
}
