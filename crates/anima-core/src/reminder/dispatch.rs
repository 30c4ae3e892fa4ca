//! What happens when a reminder goes off.
//!
//! The dispatcher is the only code path that runs on a timer firing. It shows
//! the notification when allowed, then re-arms from freshly read settings so
//! edits made while the trigger was pending take effect. Re-arming happens
//! whether or not the notification could be shown.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use super::scheduler::{ArmOutcome, ReminderScheduler};
use crate::error::Result;
use crate::host::{FireEvent, Notifier, TriggerSlot};
use crate::storage::{ReminderConfig, Settings};

pub const DEFAULT_NOTIFICATION_TITLE: &str = "Anima";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notify", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Posted,
    PermissionAbsent,
    /// The host accepted the call but did not display anything.
    Suppressed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub slot: TriggerSlot,
    pub notify: NotifyOutcome,
    /// `None` for one-shot slots that never re-arm.
    pub rearm: Option<ArmOutcome>,
}

pub struct ReminderDispatcher<Tz: TimeZone = Local> {
    settings: Settings,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
    title: String,
    tz: Tz,
}

impl ReminderDispatcher<Local> {
    pub fn new(settings: Settings, scheduler: Arc<ReminderScheduler>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings,
            scheduler,
            notifier,
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            tz: Local,
        }
    }
}

impl<Tz: TimeZone> ReminderDispatcher<Tz> {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Interpret wall-clock settings in `tz` instead of the device zone.
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> ReminderDispatcher<T> {
        ReminderDispatcher {
            settings: self.settings,
            scheduler: self.scheduler,
            notifier: self.notifier,
            title: self.title,
            tz,
        }
    }

    /// Handle a fired trigger.
    ///
    /// # Errors
    /// Only a settings store failure while re-reading the reminder config is
    /// returned. By then the notification step has already run.
    pub fn on_fire(&self, event: &FireEvent) -> Result<DispatchReport> {
        self.scheduler.mark_fired(event.slot);
        tracing::debug!(slot = %event.slot, fired_at = %event.fired_at, "reminder fired");

        let notify = self.notify(&event.message);

        if event.slot != TriggerSlot::DailyReminder {
            return Ok(DispatchReport {
                slot: event.slot,
                notify,
                rearm: None,
            });
        }

        let config = self.settings.reminder_config().map_err(|e| {
            tracing::error!(error = %e, "reading reminder settings after fire failed");
            e
        })?;
        let rearm = self.scheduler.arm(&config, &event.fired_at.with_timezone(&self.tz));

        if let Err(e) = self
            .settings
            .set_last_reminder_fired_ms(event.fired_at.timestamp_millis())
        {
            tracing::warn!(error = %e, "could not record reminder fire time");
        }

        Ok(DispatchReport {
            slot: event.slot,
            notify,
            rearm: Some(rearm),
        })
    }

    /// Startup signal. Re-derives the daily trigger from stored settings,
    /// since host timers do not survive a restart.
    pub fn on_boot<T: TimeZone>(&self, now: &DateTime<T>) -> Result<ArmOutcome> {
        let config = self.settings.reminder_config()?;
        let outcome = self.scheduler.arm(&config, &now.with_timezone(&self.tz));
        tracing::info!(?outcome, "reminder re-armed at startup");
        Ok(outcome)
    }

    /// Settings were saved by another process. Applies `config` under the
    /// same permission gate as [`ReminderService::save`]: an enabled reminder
    /// without notification permission is disarmed, not scheduled.
    ///
    /// [`ReminderService::save`]: super::ReminderService::save
    pub fn on_settings_changed<T: TimeZone>(&self, config: &ReminderConfig, now: &DateTime<T>) -> ArmOutcome {
        if config.enabled && !self.notifier.has_permission() {
            self.scheduler.disarm();
            tracing::info!("reminder enabled elsewhere; waiting for notification permission");
            return ArmOutcome::Disarmed;
        }
        self.scheduler.arm(config, &now.with_timezone(&self.tz))
    }

    fn notify(&self, message: &str) -> NotifyOutcome {
        if !self.notifier.has_permission() {
            tracing::info!("notification permission absent, skipping reminder notification");
            return NotifyOutcome::PermissionAbsent;
        }
        match self.notifier.post(&self.title, message) {
            Ok(true) => NotifyOutcome::Posted,
            Ok(false) => NotifyOutcome::Suppressed,
            Err(e) => {
                tracing::warn!(error = %e, "posting reminder notification failed");
                NotifyOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}
