//! Daily reminder scheduler.
//!
//! A self-rescheduling one-shot: the scheduler registers a single wake-up for
//! the next occurrence of the configured wall-clock time, and the dispatch
//! boundary re-arms it every time it fires. No queue of future reminders is
//! ever kept.
//!
//! ## State Transitions
//!
//! ```text
//! Disarmed --arm(enabled)--> Armed --fire--> Disarmed --re-arm--> Armed
//!    ^                         |
//!    +-------disarm()----------+
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::HostError;
use crate::host::{AlarmStrategy, ScheduledTrigger, TimerHost, TriggerSlot};
use crate::storage::ReminderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SchedulerState {
    Disarmed,
    Armed {
        trigger_at: DateTime<Utc>,
        strategy: AlarmStrategy,
    },
}

/// Result of [`ReminderScheduler::arm`]. Diagnostics only; arming never fails
/// loudly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ArmOutcome {
    Armed {
        trigger_at: DateTime<Utc>,
        strategy: AlarmStrategy,
    },
    Disarmed,
    Failed {
        reason: String,
    },
}

impl ArmOutcome {
    pub fn is_armed(&self) -> bool {
        matches!(self, ArmOutcome::Armed { .. })
    }
}

pub struct ReminderScheduler {
    host: Arc<dyn TimerHost>,
    state: Mutex<SchedulerState>,
}

impl ReminderScheduler {
    pub fn new(host: Arc<dyn TimerHost>) -> Self {
        Self {
            host,
            state: Mutex::new(SchedulerState::Disarmed),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SchedulerState {
        *self.lock_state()
    }

    /// Whether the host currently holds a daily reminder trigger.
    pub fn is_armed(&self) -> bool {
        self.host.exists(TriggerSlot::DailyReminder)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply `config` as of `now`.
    ///
    /// Disabled configs cancel any pending trigger. Enabled configs register
    /// the next occurrence of `hour:minute` after `now`, replacing whatever
    /// the slot held before.
    pub fn arm<Tz: TimeZone>(&self, config: &ReminderConfig, now: &DateTime<Tz>) -> ArmOutcome {
        if !config.enabled {
            self.disarm();
            return ArmOutcome::Disarmed;
        }

        let next = match clock::next_occurrence(config.hour, config.minute, now) {
            Ok(next) => next.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(hour = config.hour, minute = config.minute, error = %e, "cannot compute next reminder");
                return ArmOutcome::Failed { reason: e.to_string() };
            }
        };

        let mut state = self.lock_state();
        match self.register(TriggerSlot::DailyReminder, next, &config.message) {
            Ok(strategy) => {
                *state = SchedulerState::Armed {
                    trigger_at: next,
                    strategy,
                };
                tracing::debug!(trigger_at = %next, ?strategy, "daily reminder armed");
                ArmOutcome::Armed {
                    trigger_at: next,
                    strategy,
                }
            }
            Err(e) => {
                // The host may still hold an older registration; the state
                // tracks what we asked for, so reflect the host.
                if !self.host.exists(TriggerSlot::DailyReminder) {
                    *state = SchedulerState::Disarmed;
                }
                tracing::warn!(error = %e, "daily reminder could not be scheduled");
                ArmOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Cancel the pending daily reminder. No-op when nothing is registered.
    pub fn disarm(&self) {
        let mut state = self.lock_state();
        if let Err(e) = self.host.cancel(TriggerSlot::DailyReminder) {
            tracing::warn!(error = %e, "cancel of daily reminder failed");
        }
        if *state != SchedulerState::Disarmed {
            tracing::debug!("daily reminder disarmed");
        }
        *state = SchedulerState::Disarmed;
    }

    /// Record that the host consumed the trigger in `slot`.
    pub fn mark_fired(&self, slot: TriggerSlot) {
        if slot == TriggerSlot::DailyReminder {
            *self.lock_state() = SchedulerState::Disarmed;
        }
    }

    /// Register a one-shot in the test slot, independent of the daily one.
    pub fn schedule_test_at(&self, at: DateTime<Utc>, message: &str) -> bool {
        match self.register(TriggerSlot::Test, at, message) {
            Ok(strategy) => {
                tracing::debug!(trigger_at = %at, ?strategy, "test reminder scheduled");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "test reminder could not be scheduled");
                false
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Exact first; anything the host refuses is retried inexact.
    fn register(&self, slot: TriggerSlot, at: DateTime<Utc>, message: &str) -> Result<AlarmStrategy, HostError> {
        let mut trigger = ScheduledTrigger {
            slot,
            trigger_at: at,
            message: message.to_string(),
            strategy: AlarmStrategy::Exact,
        };
        match self.host.register_one_shot(&trigger) {
            Ok(()) => Ok(AlarmStrategy::Exact),
            Err(e) => {
                tracing::debug!(%slot, error = %e, "exact alarm refused, falling back to inexact");
                trigger.strategy = AlarmStrategy::InexactWhileIdle;
                self.host.register_one_shot(&trigger)?;
                Ok(AlarmStrategy::InexactWhileIdle)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
