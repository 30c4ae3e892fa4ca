//! End-to-end reminder flows over the encrypted store and a recording host.

use std::sync::Arc;

use anima_core::host::{RecordingNotifier, RecordingTimerHost};
use anima_core::reminder::NotifyOutcome;
use anima_core::{
    AlarmStrategy, ArmOutcome, MasterKey, ReminderConfig, ReminderDispatcher, ReminderScheduler, ReminderService,
    SaveOutcome, SchedulerState, SecureStore, Settings, TriggerSlot,
};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    host: Arc<RecordingTimerHost>,
    notifier: Arc<RecordingNotifier>,
    settings: Settings,
    scheduler: Arc<ReminderScheduler>,
    service: ReminderService,
    dispatcher: ReminderDispatcher<Utc>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let key = MasterKey::from_bytes([7u8; 32]);
    let store = SecureStore::open_at(&dir.path().join("settings.db"), &key).unwrap();
    let settings = Settings::new(Arc::new(store));

    let host = Arc::new(RecordingTimerHost::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let scheduler = Arc::new(ReminderScheduler::new(host.clone()));
    let service = ReminderService::new(settings.clone(), scheduler.clone(), notifier.clone());
    let dispatcher =
        ReminderDispatcher::new(settings.clone(), scheduler.clone(), notifier.clone()).with_timezone(Utc);

    Harness {
        _dir: dir,
        host,
        notifier,
        settings,
        scheduler,
        service,
        dispatcher,
    }
}

fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, d, h, m, s).unwrap()
}

fn evening(enabled: bool) -> ReminderConfig {
    ReminderConfig {
        enabled,
        hour: 20,
        minute: 0,
        message: "How are you feeling today?".into(),
    }
}

#[test]
fn saving_at_the_exact_minute_schedules_tomorrow() {
    let h = harness();

    let outcome = h.service.save(&evening(true), &at(1, 20, 0, 0)).unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Scheduled {
            arm: ArmOutcome::Armed {
                trigger_at: at(2, 20, 0, 0),
                strategy: AlarmStrategy::Exact,
            }
        }
    );
}

#[test]
fn rearming_twice_leaves_one_trigger() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();
    h.dispatcher.on_boot(&at(1, 9, 5, 0)).unwrap();
    h.dispatcher.on_boot(&at(1, 9, 6, 0)).unwrap();

    assert_eq!(h.host.registered_count(), 1);
    assert_eq!(h.host.trigger(TriggerSlot::DailyReminder).unwrap().trigger_at, at(1, 20, 0, 0));
}

#[test]
fn fire_cycle_repeats_daily() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();

    for day in 1..=3 {
        let event = h.host.fire(TriggerSlot::DailyReminder, at(day, 20, 0, 0)).unwrap();
        let report = h.dispatcher.on_fire(&event).unwrap();
        assert_eq!(report.notify, NotifyOutcome::Posted);
        assert_eq!(
            h.scheduler.state(),
            SchedulerState::Armed {
                trigger_at: at(day + 1, 20, 0, 0),
                strategy: AlarmStrategy::Exact,
            }
        );
    }
    assert_eq!(h.notifier.posted().len(), 3);
    assert_eq!(h.settings.last_reminder_fired_ms().unwrap(), at(3, 20, 0, 0).timestamp_millis());
}

#[test]
fn disabling_while_pending_stops_at_next_fire() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();
    let pending = h.host.fire(TriggerSlot::DailyReminder, at(1, 20, 0, 0)).unwrap();

    // Disabled through a direct write, so the pending trigger is not cancelled.
    h.settings.set_reminder_enabled(false).unwrap();
    let report = h.dispatcher.on_fire(&pending).unwrap();

    assert_eq!(report.rearm, Some(ArmOutcome::Disarmed));
    assert_eq!(h.scheduler.state(), SchedulerState::Disarmed);
    assert_eq!(h.host.registered_count(), 0);
}

#[test]
fn permission_revoked_at_fire_still_rearms() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();
    h.notifier.set_permission(false);

    let event = h.host.fire(TriggerSlot::DailyReminder, at(1, 20, 0, 0)).unwrap();
    let report = h.dispatcher.on_fire(&event).unwrap();

    assert_eq!(report.notify, NotifyOutcome::PermissionAbsent);
    assert!(h.notifier.posted().is_empty());
    assert_eq!(h.host.trigger(TriggerSlot::DailyReminder).unwrap().trigger_at, at(2, 20, 0, 0));
}

#[test]
fn exact_refusal_falls_back_to_inexact() {
    let h = harness();
    h.host.deny_exact(true);

    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();

    let trigger = h.host.trigger(TriggerSlot::DailyReminder).unwrap();
    assert_eq!(trigger.strategy, AlarmStrategy::InexactWhileIdle);
    assert_eq!(trigger.trigger_at, at(1, 20, 0, 0));
}

#[test]
fn duplicate_delivery_does_not_accumulate() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();
    let event = h.host.fire(TriggerSlot::DailyReminder, at(1, 20, 0, 0)).unwrap();

    h.dispatcher.on_fire(&event).unwrap();
    h.dispatcher.on_fire(&event).unwrap();

    assert_eq!(h.host.registered_count(), 1);
    assert_eq!(h.host.trigger(TriggerSlot::DailyReminder).unwrap().trigger_at, at(2, 20, 0, 0));
}

#[test]
fn message_edit_applies_on_rearm() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();
    h.settings.set_reminder_message("Time to reflect").unwrap();

    let event = h.host.fire(TriggerSlot::DailyReminder, at(1, 20, 0, 0)).unwrap();
    h.dispatcher.on_fire(&event).unwrap();

    // The fired trigger carried the old message; the new one carries the edit.
    assert_eq!(h.notifier.posted()[0].1, "How are you feeling today?");
    assert_eq!(h.host.trigger(TriggerSlot::DailyReminder).unwrap().message, "Time to reflect");
}

#[test]
fn test_slot_runs_beside_daily_reminder() {
    let h = harness();
    h.service.save(&evening(true), &at(1, 9, 0, 0)).unwrap();

    assert!(h.service.schedule_test_at(at(1, 9, 1, 0), "Test reminder"));
    assert_eq!(h.host.registered_count(), 2);

    let event = h.host.fire(TriggerSlot::Test, at(1, 9, 1, 0)).unwrap();
    let report = h.dispatcher.on_fire(&event).unwrap();

    assert_eq!(report.rearm, None);
    assert!(h.host.trigger(TriggerSlot::DailyReminder).is_some());
    assert!(h.host.trigger(TriggerSlot::Test).is_none());
}

#[test]
fn outcomes_serialize_for_diagnostics() {
    let outcome = ArmOutcome::Armed {
        trigger_at: at(2, 20, 0, 0),
        strategy: AlarmStrategy::InexactWhileIdle,
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "armed");
    assert_eq!(json["strategy"], "inexact_while_idle");
}
