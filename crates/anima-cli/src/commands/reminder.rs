use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use anima_core::host::TokioTimerHost;
use anima_core::reminder::NotifyOutcome;
use anima_core::{ArmOutcome, ReminderConfig, ReminderDispatcher, ReminderService, SaveOutcome, TimerHost};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Subcommand;
use serde_json::json;
use tokio::runtime::Handle;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Print reminder settings and the next fire time as JSON
    Show,
    /// Change the reminder time and/or message
    Set {
        /// Hour of day, 0-23
        #[arg(long)]
        hour: Option<u32>,
        /// Minute, 0-59
        #[arg(long)]
        minute: Option<u32>,
        /// Notification text
        #[arg(long)]
        message: Option<String>,
    },
    /// Turn the daily reminder on
    Enable,
    /// Turn the daily reminder off
    Disable,
    /// Print when the reminder fires next
    Next,
    /// Send a test notification now, or after a delay
    Test {
        /// Notification text
        #[arg(long, default_value = "This is a test reminder")]
        message: String,
        /// Schedule through the timer host after this many seconds
        #[arg(long = "in")]
        in_secs: Option<u64>,
    },
}

pub fn run(action: ReminderAction) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::open()?;
    let service = ctx.reminder_service();

    match action {
        ReminderAction::Show => {
            let config = service.config()?;
            let last_fired = ctx.settings.last_reminder_fired_ms()?;
            let next = service.next_fire(&Local::now())?;
            let out = json!({
                "enabled": config.enabled,
                "time": format!("{:02}:{:02}", config.hour, config.minute),
                "message": config.message,
                "next_fire": next.map(|t| t.to_rfc3339()),
                "last_fired": (last_fired > 0)
                    .then(|| Local.timestamp_millis_opt(last_fired).single())
                    .flatten()
                    .map(|t| t.to_rfc3339()),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        ReminderAction::Set { hour, minute, message } => {
            let mut config = service.config()?;
            if let Some(hour) = hour {
                config.hour = hour;
            }
            if let Some(minute) = minute {
                config.minute = minute;
            }
            if let Some(message) = message {
                config.message = message;
            }
            save(&service, &config)?;
        }
        ReminderAction::Enable => set_enabled(&service, true)?,
        ReminderAction::Disable => set_enabled(&service, false)?,
        ReminderAction::Next => match service.next_fire(&Local::now())? {
            Some(next) => println!("{}", next.format("%Y-%m-%d %H:%M %Z")),
            None => println!("reminder disabled"),
        },
        ReminderAction::Test { message, in_secs: None } => {
            if !service.send_test_notification(&message) {
                return Err("test notification not shown (notifications.enabled = false?)".into());
            }
        }
        ReminderAction::Test {
            message,
            in_secs: Some(secs),
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(scheduled_test(&ctx, &message, secs))?;
        }
    }
    Ok(())
}

fn set_enabled(service: &ReminderService, enabled: bool) -> Result<(), Box<dyn Error>> {
    let mut config = service.config()?;
    config.enabled = enabled;
    save(service, &config)
}

fn save(service: &ReminderService, config: &ReminderConfig) -> Result<(), Box<dyn Error>> {
    match service.save(config, &Local::now())? {
        SaveOutcome::Scheduled { arm } => match arm {
            ArmOutcome::Armed { trigger_at, .. } => {
                println!("saved; next reminder at {}", local(trigger_at).format("%Y-%m-%d %H:%M"));
            }
            other => println!("saved; scheduling reported {other:?}"),
        },
        SaveOutcome::Disarmed => println!("saved; reminder disabled"),
        SaveOutcome::PermissionRequired => {
            println!("saved; notifications are disabled, so nothing is scheduled (set notifications.enabled = true)");
        }
    }
    Ok(())
}

/// Round-trip a test trigger through the real timer host and dispatcher.
async fn scheduled_test(ctx: &AppContext, message: &str, secs: u64) -> Result<(), Box<dyn Error>> {
    let (host, mut fires) = TokioTimerHost::new(Handle::current());
    let host: Arc<dyn TimerHost> = Arc::new(host);
    let scheduler = ctx.scheduler(host);
    let dispatcher = ReminderDispatcher::new(ctx.settings.clone(), scheduler.clone(), ctx.notifier())
        .with_title(ctx.config.notifications.title.clone());

    let delay = chrono::Duration::seconds(i64::try_from(secs)?);
    if !scheduler.schedule_test_at(Utc::now() + delay, message) {
        return Err("test reminder could not be scheduled".into());
    }
    println!("test reminder scheduled in {secs}s");

    let wait = Duration::from_secs(secs.saturating_add(90));
    let event = tokio::time::timeout(wait, fires.recv())
        .await?
        .ok_or("timer host stopped before the test reminder fired")?;
    let report = dispatcher.on_fire(&event)?;
    if report.notify != NotifyOutcome::Posted {
        return Err(format!("test reminder fired but was not shown: {:?}", report.notify).into());
    }
    Ok(())
}

fn local(at: DateTime<Utc>) -> DateTime<Local> {
    at.with_timezone(&Local)
}
