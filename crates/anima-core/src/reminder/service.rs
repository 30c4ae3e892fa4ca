//! Settings-screen operations for the reminder.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::dispatch::DEFAULT_NOTIFICATION_TITLE;
use super::scheduler::{ArmOutcome, ReminderScheduler};
use crate::clock;
use crate::error::Result;
use crate::host::Notifier;
use crate::storage::{ReminderConfig, Settings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "saved", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Enabled and handed to the scheduler.
    Scheduled { arm: ArmOutcome },
    Disarmed,
    /// Stored as enabled, but nothing is scheduled until notifications are
    /// allowed.
    PermissionRequired,
}

pub struct ReminderService {
    settings: Settings,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
    title: String,
}

impl ReminderService {
    pub fn new(settings: Settings, scheduler: Arc<ReminderScheduler>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings,
            scheduler,
            notifier,
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn config(&self) -> Result<ReminderConfig> {
        self.settings.reminder_config()
    }

    /// Persist `config` and apply it as of `now`.
    pub fn save<Tz: TimeZone>(&self, config: &ReminderConfig, now: &DateTime<Tz>) -> Result<SaveOutcome> {
        self.settings.save_reminder_config(config)?;

        if !config.enabled {
            self.scheduler.disarm();
            return Ok(SaveOutcome::Disarmed);
        }
        if !self.notifier.has_permission() {
            // A trigger for the previous time would fire with stale settings.
            self.scheduler.disarm();
            tracing::info!("reminder saved as enabled; waiting for notification permission");
            return Ok(SaveOutcome::PermissionRequired);
        }

        Ok(SaveOutcome::Scheduled {
            arm: self.scheduler.arm(config, now),
        })
    }

    /// The instant the stored reminder would fire next, or `None` when it is
    /// disabled.
    pub fn next_fire<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Option<DateTime<Tz>>> {
        let config = self.settings.reminder_config()?;
        if !config.enabled {
            return Ok(None);
        }
        Ok(Some(clock::next_occurrence(config.hour, config.minute, now)?))
    }

    /// Post a notification right away. `false` when permission is absent or
    /// the host refused.
    pub fn send_test_notification(&self, message: &str) -> bool {
        if !self.notifier.has_permission() {
            return false;
        }
        match self.notifier.post(&self.title, message) {
            Ok(shown) => shown,
            Err(e) => {
                tracing::warn!(error = %e, "test notification failed");
                false
            }
        }
    }

    pub fn schedule_test_at(&self, at: DateTime<Utc>, message: &str) -> bool {
        self.scheduler.schedule_test_at(at, message)
    }
}
