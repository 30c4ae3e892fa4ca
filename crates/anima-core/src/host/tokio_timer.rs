//! Timer host for desktop processes, built on tokio tasks.
//!
//! Each slot owns at most one task. The task waits against the wall clock
//! (`Utc::now()`), not against elapsed monotonic time, so a suspended laptop
//! or a clock adjustment does not shift the wall-clock target. When the
//! deadline passes it delivers a [`FireEvent`] on the channel returned by
//! [`TokioTimerHost::new`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AlarmStrategy, FireEvent, ScheduledTrigger, TimerHost, TriggerSlot};
use crate::error::HostError;

/// Longest single nap for exact alarms before re-reading the clock.
const EXACT_MAX_NAP: Duration = Duration::from_secs(30);
/// Polling period for inexact alarms; they fire on the first tick at or after
/// the deadline.
const INEXACT_TICK: Duration = Duration::from_secs(60);

struct Registration {
    generation: u64,
    task: JoinHandle<()>,
}

type SlotMap = HashMap<TriggerSlot, Registration>;

pub struct TokioTimerHost {
    runtime: Handle,
    slots: Arc<Mutex<SlotMap>>,
    generation: AtomicU64,
    fire_tx: mpsc::UnboundedSender<FireEvent>,
    exact_allowed: bool,
}

impl TokioTimerHost {
    /// Create a host spawning onto `runtime`. Fire events arrive on the
    /// returned receiver.
    pub fn new(runtime: Handle) -> (Self, mpsc::UnboundedReceiver<FireEvent>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let host = Self {
            runtime,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            fire_tx,
            exact_allowed: true,
        };
        (host, fire_rx)
    }

    /// Refuse exact alarms, mirroring a host whose power policy forbids them.
    pub fn with_exact_alarms(mut self, allowed: bool) -> Self {
        self.exact_allowed = allowed;
        self
    }

    fn slots(&self) -> MutexGuard<'_, SlotMap> {
        lock_slots(&self.slots)
    }
}

fn lock_slots(slots: &Mutex<SlotMap>) -> MutexGuard<'_, SlotMap> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

impl TimerHost for TokioTimerHost {
    fn register_one_shot(&self, trigger: &ScheduledTrigger) -> Result<(), HostError> {
        if trigger.strategy == AlarmStrategy::Exact && !self.exact_allowed {
            return Err(HostError::SchedulingDenied("exact alarms disabled for this host".into()));
        }
        if self.fire_tx.is_closed() {
            return Err(HostError::Backend("fire event receiver dropped".into()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let slots = Arc::clone(&self.slots);
        let fire_tx = self.fire_tx.clone();
        let slot = trigger.slot;
        let trigger = trigger.clone();

        // Hold the lock across spawn so the task cannot observe the map
        // before its own registration is in it.
        let mut map = self.slots();
        let task = self.runtime.spawn(async move {
            wait_until(&trigger).await;

            {
                let mut map = lock_slots(&slots);
                match map.get(&trigger.slot) {
                    Some(r) if r.generation == generation => {
                        map.remove(&trigger.slot);
                    }
                    // Superseded or cancelled while we were waking up.
                    _ => return,
                }
            }

            let event = FireEvent {
                slot: trigger.slot,
                message: trigger.message,
                fired_at: Utc::now(),
            };
            if fire_tx.send(event).is_err() {
                tracing::warn!(slot = %trigger.slot, "fire event dropped: no receiver");
            }
        });

        if let Some(previous) = map.insert(slot, Registration { generation, task }) {
            previous.task.abort();
        }
        tracing::debug!(%slot, generation, "one-shot registered");
        Ok(())
    }

    fn cancel(&self, slot: TriggerSlot) -> Result<(), HostError> {
        if let Some(previous) = self.slots().remove(&slot) {
            previous.task.abort();
        }
        Ok(())
    }

    fn exists(&self, slot: TriggerSlot) -> bool {
        self.slots().contains_key(&slot)
    }
}

async fn wait_until(trigger: &ScheduledTrigger) {
    loop {
        let remaining = match (trigger.trigger_at - Utc::now()).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => return,
        };
        let nap = match trigger.strategy {
            AlarmStrategy::Exact => remaining.min(EXACT_MAX_NAP),
            AlarmStrategy::InexactWhileIdle => INEXACT_TICK,
        };
        tokio::time::sleep(nap).await;
    }
}
