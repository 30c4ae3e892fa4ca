use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anima_core::host::TokioTimerHost;
use anima_core::{ArmOutcome, FireEvent, ReminderConfig, ReminderDispatcher, ReminderScheduler, Settings, TimerHost};
use chrono::Local;
use clap::Args;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::context::AppContext;

/// How often the daemon re-reads reminder settings saved by other processes.
const RESYNC_PERIOD: Duration = Duration::from_secs(30);

#[derive(Args)]
pub struct DaemonArgs {
    /// Use only inexact (batched) alarms
    #[arg(long)]
    pub no_exact: bool,
}

pub fn run(args: DaemonArgs) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::open()?;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        let (host, fires) = TokioTimerHost::new(Handle::current());
        let host: Arc<dyn TimerHost> = Arc::new(host.with_exact_alarms(!args.no_exact));
        let scheduler = ctx.scheduler(host);
        let dispatcher = ReminderDispatcher::new(ctx.settings.clone(), scheduler.clone(), ctx.notifier())
            .with_title(ctx.config.notifications.title.clone());

        Daemon::new(ctx.settings.clone(), scheduler, dispatcher)
            .serve(fires, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for ctrl-c");
                }
            })
            .await
    })
}

/// Long-running reminder host: re-arms at boot, dispatches fires, and picks up
/// settings saved by one-shot commands.
pub(crate) struct Daemon {
    settings: Settings,
    scheduler: Arc<ReminderScheduler>,
    dispatcher: Arc<ReminderDispatcher>,
    resync_period: Duration,
}

impl Daemon {
    pub(crate) fn new(settings: Settings, scheduler: Arc<ReminderScheduler>, dispatcher: ReminderDispatcher) -> Self {
        Self {
            settings,
            scheduler,
            dispatcher: Arc::new(dispatcher),
            resync_period: RESYNC_PERIOD,
        }
    }

    #[cfg(test)]
    fn with_resync_period(mut self, period: Duration) -> Self {
        self.resync_period = period;
        self
    }

    /// Run until `shutdown` resolves. A settings store failure ends the loop
    /// with an error.
    pub(crate) async fn serve(
        self,
        mut fires: UnboundedReceiver<FireEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Box<dyn Error>> {
        // Boot signal: host timers do not outlive the process.
        let (outcome, mut applied) = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let settings = self.settings.clone();
            blocking(move || {
                let outcome = dispatcher.on_boot(&Local::now())?;
                Ok((outcome, settings.reminder_config()?))
            })
            .await?
        };
        tracing::info!(?outcome, "anima daemon started");

        let mut resync = tokio::time::interval(self.resync_period);
        resync.tick().await;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(event) = fires.recv() => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let settings = self.settings.clone();
                    let (report, current) = blocking(move || {
                        let report = dispatcher.on_fire(&event)?;
                        Ok((report, settings.reminder_config()?))
                    })
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "reminder dispatch failed"))?;
                    tracing::info!(?report, "reminder dispatched");
                    if !matches!(report.rearm, Some(ArmOutcome::Failed { .. })) {
                        applied = current;
                    }
                }
                _ = resync.tick() => {
                    if let Some(current) = self.resync(&applied).await? {
                        applied = current;
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("shutting down");
                    break;
                }
            }
        }

        self.scheduler.disarm();
        Ok(())
    }

    /// Re-read settings and re-arm if they differ from `applied`. Returns the
    /// config to remember as applied; `None` leaves the old one so a failed
    /// re-arm is retried on the next tick.
    async fn resync(&self, applied: &ReminderConfig) -> Result<Option<ReminderConfig>, Box<dyn Error>> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let settings = self.settings.clone();
        let seen = applied.clone();
        let changed = blocking(move || {
            let current = settings.reminder_config()?;
            if current == seen {
                return Ok(None);
            }
            let outcome = dispatcher.on_settings_changed(&current, &Local::now());
            Ok(Some((current, outcome)))
        })
        .await?;

        match changed {
            Some((_, ArmOutcome::Failed { reason })) => {
                tracing::warn!(%reason, "reminder settings changed but re-arm failed; will retry");
                Ok(None)
            }
            Some((current, outcome)) => {
                tracing::info!(?outcome, "reminder settings changed, re-armed");
                Ok(Some(current))
            }
            None => Ok(None),
        }
    }
}

/// Store access is blocking I/O; keep it off the runtime workers.
async fn blocking<T, F>(f: F) -> Result<T, Box<dyn Error>>
where
    F: FnOnce() -> anima_core::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
