//! PIN gate with timed lockout.
//!
//! ## State Transitions
//!
//! ```text
//! PendingSetup --any PIN--> Authenticated
//! AwaitingInput --match--> Authenticated
//! AwaitingInput --mismatch x N--> LockedOut --time passes--> AwaitingInput
//! ```
//!
//! Counters and the lockout deadline live in the settings store, so closing
//! and reopening the app does not clear a lockout. `Authenticated` is held in
//! memory only and lasts for the life of the gate.
//!
//! Attempts on one gate run one at a time. Separate processes share only the
//! store, whose atomic counter keeps every miss counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pin;
use crate::error::{Result, StoreError, ValidationError};
use crate::storage::{SecurityConfig, SettingKey, Settings};

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Consecutive mismatches that impose a lockout.
    pub max_failed_attempts: u32,
    pub lockout_secs: u64,
    /// Whether biometric unlock waits out a standing lockout.
    pub biometric_honors_lockout: bool,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_secs: DEFAULT_LOCKOUT_SECS,
            biometric_honors_lockout: true,
        }
    }
}

impl From<&SecurityConfig> for LockoutPolicy {
    fn from(cfg: &SecurityConfig) -> Self {
        Self {
            max_failed_attempts: cfg.max_failed_attempts.max(1),
            lockout_secs: cfg.lockout_secs.max(1),
            biometric_honors_lockout: cfg.biometric_honors_lockout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    /// `pin_created` is set when this attempt set the first PIN.
    Success { pin_created: bool },
    Failure { attempts_remaining: u32 },
    /// This attempt imposed a new lockout.
    LockedOut { lockout_secs: u64 },
    /// A lockout was already in force; nothing was compared.
    StillLocked { remaining_secs: u64 },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    PendingSetup,
    LockedOut { until: DateTime<Utc> },
    AwaitingInput,
    Authenticated,
}

pub struct AuthGate {
    settings: Settings,
    policy: LockoutPolicy,
    authenticated: AtomicBool,
    attempts: Mutex<()>,
}

impl AuthGate {
    pub fn new(settings: Settings, policy: LockoutPolicy) -> Self {
        Self {
            settings,
            policy,
            authenticated: AtomicBool::new(false),
            attempts: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whole seconds left on the lockout, rounded up; `0` when not locked.
    pub fn current_lockout(&self, now: DateTime<Utc>) -> Result<u64> {
        let until = self.settings.lock_until_ms()?;
        Ok(remaining_secs(until, now.timestamp_millis()))
    }

    pub fn state(&self, now: DateTime<Utc>) -> Result<AuthState> {
        if self.authenticated.load(Ordering::SeqCst) {
            return Ok(AuthState::Authenticated);
        }
        let until_ms = self.settings.lock_until_ms()?;
        if until_ms > now.timestamp_millis() {
            let until = DateTime::from_timestamp_millis(until_ms).ok_or_else(|| StoreError::Corrupt {
                key: SettingKey::LockUntil.as_str().to_string(),
                value: until_ms.to_string(),
            })?;
            return Ok(AuthState::LockedOut { until });
        }
        if self.settings.pin_digest()?.is_none() {
            return Ok(AuthState::PendingSetup);
        }
        Ok(AuthState::AwaitingInput)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Check `candidate` as of `now`.
    ///
    /// With no PIN configured, any candidate (including an empty one) becomes
    /// the PIN.
    ///
    /// # Errors
    /// Store failures propagate; entry must stay blocked when they happen.
    pub fn attempt(&self, candidate: &str, now: DateTime<Utc>) -> Result<AuthOutcome> {
        let _serial = self.serialize()?;
        let now_ms = now.timestamp_millis();
        let until = self.settings.lock_until_ms()?;
        if until > now_ms {
            let remaining_secs = remaining_secs(until, now_ms);
            tracing::debug!(remaining_secs, "attempt rejected: still locked");
            return Ok(AuthOutcome::StillLocked { remaining_secs });
        }

        let Some(stored) = self.settings.pin_digest()? else {
            self.settings.set_pin_digest(&pin::digest(candidate)?)?;
            self.succeed()?;
            tracing::info!("PIN configured on first entry");
            return Ok(AuthOutcome::Success { pin_created: true });
        };

        if pin::verify(&stored, candidate)? {
            self.succeed()?;
            return Ok(AuthOutcome::Success { pin_created: false });
        }

        let failures = self.settings.record_failed_attempt()?;
        if failures >= self.policy.max_failed_attempts {
            let lock_until = now_ms.saturating_add(lockout_ms(self.policy.lockout_secs));
            // Deadline before the counter reset.
            self.settings.set_lock_until_ms(lock_until)?;
            self.settings.set_failed_attempts(0)?;
            tracing::warn!(lockout_secs = self.policy.lockout_secs, "too many failed PIN attempts, locking out");
            return Ok(AuthOutcome::LockedOut {
                lockout_secs: self.policy.lockout_secs,
            });
        }

        tracing::debug!(failures, "PIN mismatch");
        Ok(AuthOutcome::Failure {
            attempts_remaining: self.policy.max_failed_attempts - failures,
        })
    }

    /// The platform reported a successful biometric match.
    pub fn attempt_biometric(&self, now: DateTime<Utc>) -> Result<AuthOutcome> {
        let _serial = self.serialize()?;
        if self.policy.biometric_honors_lockout {
            let remaining_secs = self.current_lockout(now)?;
            if remaining_secs > 0 {
                return Ok(AuthOutcome::StillLocked { remaining_secs });
            }
        }
        self.succeed()?;
        Ok(AuthOutcome::Success { pin_created: false })
    }

    /// Replace the PIN from the settings screen.
    pub fn change_pin(&self, new_pin: &str, confirm: &str) -> Result<()> {
        if new_pin.trim().is_empty() {
            return Err(ValidationError::BlankPin.into());
        }
        if new_pin != confirm {
            return Err(ValidationError::PinMismatch.into());
        }
        let _serial = self.serialize()?;
        self.settings.set_pin_digest(&pin::digest(new_pin)?)?;
        self.settings.set_failed_attempts(0)?;
        tracing::info!("PIN changed");
        Ok(())
    }

    fn serialize(&self) -> Result<MutexGuard<'_, ()>> {
        self.attempts.lock().map_err(|_| StoreError::Locked.into())
    }

    fn succeed(&self) -> Result<()> {
        self.settings.set_failed_attempts(0)?;
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn lockout_ms(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

fn remaining_secs(until_ms: i64, now_ms: i64) -> u64 {
    if until_ms <= now_ms {
        return 0;
    }
    let diff = until_ms.saturating_sub(now_ms) as u64;
    diff.div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn gate() -> (Settings, AuthGate) {
        let settings = Settings::new(Arc::new(MemoryStore::new()));
        let gate = AuthGate::new(settings.clone(), LockoutPolicy::default());
        (settings, gate)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn remaining_rounds_up() {
        assert_eq!(remaining_secs(1_500, 1_000), 1);
        assert_eq!(remaining_secs(61_000, 1_000), 60);
        assert_eq!(remaining_secs(60_001, 0), 61);
        assert_eq!(remaining_secs(0, 1_000), 0);
    }

    #[test]
    fn first_attempt_sets_pin() {
        let (settings, gate) = gate();
        assert_eq!(gate.state(t0()).unwrap(), AuthState::PendingSetup);

        let outcome = gate.attempt("2580", t0()).unwrap();

        assert_eq!(outcome, AuthOutcome::Success { pin_created: true });
        assert!(settings.pin_digest().unwrap().is_some());
        assert_eq!(gate.state(t0()).unwrap(), AuthState::Authenticated);
    }

    #[test]
    fn failures_count_down() {
        let (settings, gate) = gate();
        gate.change_pin("2580", "2580").unwrap();

        assert_eq!(
            gate.attempt("0000", t0()).unwrap(),
            AuthOutcome::Failure { attempts_remaining: 2 }
        );
        assert_eq!(
            gate.attempt("0000", t0()).unwrap(),
            AuthOutcome::Failure { attempts_remaining: 1 }
        );
        assert_eq!(settings.failed_attempts().unwrap(), 2);
    }

    #[test]
    fn third_failure_locks() {
        let (settings, gate) = gate();
        gate.change_pin("2580", "2580").unwrap();
        gate.attempt("1", t0()).unwrap();
        gate.attempt("2", t0()).unwrap();

        assert_eq!(
            gate.attempt("3", t0()).unwrap(),
            AuthOutcome::LockedOut { lockout_secs: 60 }
        );
        assert_eq!(settings.failed_attempts().unwrap(), 0);
        assert_eq!(settings.lock_until_ms().unwrap(), (t0() + Duration::seconds(60)).timestamp_millis());
        assert_eq!(
            gate.state(t0()).unwrap(),
            AuthState::LockedOut {
                until: t0() + Duration::seconds(60)
            }
        );
    }

    #[test]
    fn concurrent_misses_still_lock() {
        use std::sync::Barrier;

        let (settings, gate) = gate();
        gate.change_pin("2580", "2580").unwrap();
        let gate = Arc::new(gate);
        let start = Arc::new(Barrier::new(3));

        let workers: Vec<_> = (0..3)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let start = Arc::clone(&start);
                std::thread::spawn(move || {
                    start.wait();
                    gate.attempt(&format!("000{i}"), t0()).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert!(outcomes.contains(&AuthOutcome::Failure { attempts_remaining: 2 }));
        assert!(outcomes.contains(&AuthOutcome::Failure { attempts_remaining: 1 }));
        assert!(outcomes.contains(&AuthOutcome::LockedOut { lockout_secs: 60 }));
        assert_eq!(settings.failed_attempts().unwrap(), 0);
        assert!(gate.current_lockout(t0()).unwrap() > 0);
    }

    #[test]
    fn biometric_respects_policy() {
        let settings = Settings::new(Arc::new(MemoryStore::new()));
        settings.set_lock_until_ms((t0() + Duration::seconds(30)).timestamp_millis()).unwrap();

        let strict = AuthGate::new(settings.clone(), LockoutPolicy::default());
        assert_eq!(
            strict.attempt_biometric(t0()).unwrap(),
            AuthOutcome::StillLocked { remaining_secs: 30 }
        );

        let lenient = AuthGate::new(
            settings.clone(),
            LockoutPolicy {
                biometric_honors_lockout: false,
                ..LockoutPolicy::default()
            },
        );
        assert!(lenient.attempt_biometric(t0()).unwrap().is_success());
    }

    #[test]
    fn biometric_resets_failures() {
        let (settings, gate) = gate();
        gate.change_pin("2580", "2580").unwrap();
        gate.attempt("0", t0()).unwrap();

        assert!(gate.attempt_biometric(t0()).unwrap().is_success());
        assert_eq!(settings.failed_attempts().unwrap(), 0);
    }

    #[test]
    fn change_pin_validates() {
        let (_settings, gate) = gate();
        assert!(matches!(
            gate.change_pin("  ", "  "),
            Err(crate::error::CoreError::Validation(ValidationError::BlankPin))
        ));
        assert!(matches!(
            gate.change_pin("1234", "1243"),
            Err(crate::error::CoreError::Validation(ValidationError::PinMismatch))
        ));

        gate.change_pin("1234", "1234").unwrap();
        assert_eq!(gate.state(t0()).unwrap(), AuthState::AwaitingInput);
        assert!(gate.attempt("1234", t0()).unwrap().is_success());
    }

    #[test]
    fn policy_from_config_clamps_zero() {
        let cfg = SecurityConfig {
            max_failed_attempts: 0,
            lockout_secs: 0,
            ..SecurityConfig::default()
        };
        let policy = LockoutPolicy::from(&cfg);
        assert_eq!(policy.max_failed_attempts, 1);
        assert_eq!(policy.lockout_secs, 1);
    }
}
