//! Daily reminder: scheduling, firing, and the settings-screen operations.

pub mod dispatch;
pub mod scheduler;
pub mod service;

pub use dispatch::{DispatchReport, NotifyOutcome, ReminderDispatcher};
pub use scheduler::{ArmOutcome, ReminderScheduler, SchedulerState};
pub use service::{ReminderService, SaveOutcome};
