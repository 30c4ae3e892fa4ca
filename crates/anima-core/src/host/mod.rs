//! Seams to the host platform.
//!
//! The core never sleeps, never shows anything, and never talks to an OS
//! alarm service itself. It drives these traits, and each host (the CLI
//! daemon, a mobile shell, a test) supplies implementations.

mod memory;
mod tokio_timer;

pub use memory::{RecordingNotifier, RecordingTimerHost};
pub use tokio_timer::TokioTimerHost;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Stable identity a trigger is registered under. Registering into an
/// occupied slot replaces the previous trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSlot {
    DailyReminder,
    Test,
}

impl TriggerSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSlot::DailyReminder => "daily-reminder",
            TriggerSlot::Test => "test",
        }
    }
}

impl fmt::Display for TriggerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How precisely the host should honor `trigger_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmStrategy {
    /// Fire at the instant, waking the device if needed.
    Exact,
    /// Fire at or after the instant, batched with other wake-ups.
    InexactWhileIdle,
}

/// A one-shot wake-up as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    pub slot: TriggerSlot,
    pub trigger_at: DateTime<Utc>,
    /// Captured at registration; not re-read when the trigger fires.
    pub message: String,
    pub strategy: AlarmStrategy,
}

/// Delivered by the host when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireEvent {
    pub slot: TriggerSlot,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

/// Host one-shot timer facility.
pub trait TimerHost: Send + Sync {
    /// Register `trigger`, replacing anything already in its slot.
    fn register_one_shot(&self, trigger: &ScheduledTrigger) -> Result<(), HostError>;

    /// Cancel the trigger in `slot`. Cancelling an empty slot succeeds.
    fn cancel(&self, slot: TriggerSlot) -> Result<(), HostError>;

    fn exists(&self, slot: TriggerSlot) -> bool;
}

/// Host notification facility.
pub trait Notifier: Send + Sync {
    /// Runtime permission to show notifications.
    fn has_permission(&self) -> bool;

    /// Show a notification. `Ok(false)` means the host accepted the call but
    /// chose not to display it.
    fn post(&self, title: &str, body: &str) -> Result<bool, HostError>;
}
