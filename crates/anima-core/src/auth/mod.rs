//! App entry gate: PIN or biometric, with lockout after repeated failures.

mod lockout;
pub mod pin;

pub use lockout::{
    AuthGate, AuthOutcome, AuthState, LockoutPolicy, DEFAULT_LOCKOUT_SECS, DEFAULT_MAX_FAILED_ATTEMPTS,
};
