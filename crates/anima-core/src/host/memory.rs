//! In-process host facilities that record what they are asked to do.
//!
//! Nothing here fires on its own: a test (or an embedding host with its own
//! event loop) calls [`RecordingTimerHost::fire`] to simulate delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{AlarmStrategy, FireEvent, Notifier, ScheduledTrigger, TimerHost, TriggerSlot};
use crate::error::HostError;

#[derive(Debug, Default)]
pub struct RecordingTimerHost {
    slots: Mutex<HashMap<TriggerSlot, ScheduledTrigger>>,
    deny_exact: AtomicBool,
    deny_all: AtomicBool,
}

impl RecordingTimerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse `AlarmStrategy::Exact`, as a power-managed host would.
    pub fn deny_exact(&self, deny: bool) {
        self.deny_exact.store(deny, Ordering::SeqCst);
    }

    /// Refuse every registration.
    pub fn deny_all(&self, deny: bool) {
        self.deny_all.store(deny, Ordering::SeqCst);
    }

    pub fn trigger(&self, slot: TriggerSlot) -> Option<ScheduledTrigger> {
        self.slots().get(&slot).cloned()
    }

    /// Number of triggers currently registered across all slots.
    pub fn registered_count(&self) -> usize {
        self.slots().len()
    }

    /// Consume the trigger in `slot` as the host would when it goes off.
    pub fn fire(&self, slot: TriggerSlot, fired_at: DateTime<Utc>) -> Option<FireEvent> {
        self.slots().remove(&slot).map(|t| FireEvent {
            slot: t.slot,
            message: t.message,
            fired_at,
        })
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TriggerSlot, ScheduledTrigger>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TimerHost for RecordingTimerHost {
    fn register_one_shot(&self, trigger: &ScheduledTrigger) -> Result<(), HostError> {
        if self.deny_all.load(Ordering::SeqCst) {
            return Err(HostError::SchedulingDenied("all alarms refused".into()));
        }
        if trigger.strategy == AlarmStrategy::Exact && self.deny_exact.load(Ordering::SeqCst) {
            return Err(HostError::SchedulingDenied("exact alarms not permitted".into()));
        }
        self.slots().insert(trigger.slot, trigger.clone());
        Ok(())
    }

    fn cancel(&self, slot: TriggerSlot) -> Result<(), HostError> {
        self.slots().remove(&slot);
        Ok(())
    }

    fn exists(&self, slot: TriggerSlot) -> bool {
        self.slots().contains_key(&slot)
    }
}

#[derive(Debug)]
pub struct RecordingNotifier {
    permission: AtomicBool,
    fail_posts: AtomicBool,
    posted: Mutex<Vec<(String, String)>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            permission: AtomicBool::new(true),
            fail_posts: AtomicBool::new(false),
            posted: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    /// `(title, body)` of every notification shown so far.
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn post(&self, title: &str, body: &str) -> Result<bool, HostError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(HostError::Backend("notification service unavailable".into()));
        }
        if !self.has_permission() {
            return Ok(false);
        }
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
        Ok(true)
    }
}
