//! # Anima Core Library
//!
//! Core logic for the Anima mood journal: the daily reminder that reschedules
//! itself and the PIN gate in front of the journal. Hosts (the `anima` CLI,
//! a mobile shell) supply timers and notifications through the traits in
//! [`host`]; everything else lives here.
//!
//! ## Architecture
//!
//! - **Clock**: epoch-day keys and DST-aware next-occurrence math
//! - **Storage**: encrypted SQLite key-value settings and TOML configuration
//! - **Reminder**: scheduler state machine, fire-time dispatch, and the
//!   settings-screen service
//! - **Auth**: PIN digests and the lockout state machine
//!
//! ## Key Components
//!
//! - [`ReminderScheduler`]: arms and disarms the daily one-shot trigger
//! - [`ReminderDispatcher`]: handles a fired trigger and re-arms
//! - [`AuthGate`]: PIN attempts, biometric unlock, lockout
//! - [`Settings`]: typed access to the persisted state
//! - [`Config`]: application configuration management

pub mod auth;
pub mod clock;
pub mod error;
pub mod host;
pub mod reminder;
pub mod storage;

pub use auth::{AuthGate, AuthOutcome, AuthState, LockoutPolicy};
pub use error::{ClockError, ConfigError, CoreError, HostError, StoreError, ValidationError};
pub use host::{AlarmStrategy, FireEvent, Notifier, ScheduledTrigger, TimerHost, TriggerSlot};
pub use reminder::{
    ArmOutcome, DispatchReport, NotifyOutcome, ReminderDispatcher, ReminderScheduler, ReminderService, SaveOutcome,
    SchedulerState,
};
pub use storage::{Config, KvStore, MasterKey, MemoryStore, ReminderConfig, SecureStore, Settings, ThemeMode};
