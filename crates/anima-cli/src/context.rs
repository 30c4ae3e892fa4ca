//! Shared setup for commands that touch the settings store.

use std::error::Error;
use std::sync::Arc;

use anima_core::auth::LockoutPolicy;
use anima_core::host::RecordingTimerHost;
use anima_core::storage::load_master_key;
use anima_core::{AuthGate, Config, ReminderScheduler, ReminderService, SecureStore, Settings, TimerHost};

use crate::notifier::ConsoleNotifier;

pub struct AppContext {
    pub config: Config,
    pub settings: Settings,
}

impl AppContext {
    /// Load config, obtain the master key, and open the encrypted store.
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let key = load_master_key(config.security.key_source, &config.security.key_env_var)?;
        let store = SecureStore::open(&key)?;
        let settings = Settings::new(Arc::new(store)).with_default_message(config.reminder.default_message.clone());
        Ok(Self { config, settings })
    }

    pub fn notifier(&self) -> Arc<ConsoleNotifier> {
        Arc::new(ConsoleNotifier::new(self.config.notifications.enabled))
    }

    pub fn scheduler(&self, host: Arc<dyn TimerHost>) -> Arc<ReminderScheduler> {
        Arc::new(ReminderScheduler::new(host))
    }

    /// Reminder service for one-shot commands. The timer host only records
    /// what would be registered; the daemon owns the live trigger and picks
    /// saved changes up on its next resync.
    pub fn reminder_service(&self) -> ReminderService {
        let host: Arc<dyn TimerHost> = Arc::new(RecordingTimerHost::new());
        ReminderService::new(self.settings.clone(), self.scheduler(host), self.notifier())
            .with_title(self.config.notifications.title.clone())
    }

    pub fn auth_gate(&self) -> AuthGate {
        AuthGate::new(self.settings.clone(), LockoutPolicy::from(&self.config.security))
    }
}
