use std::error::Error;
use std::io::BufRead;

use anima_core::{AuthOutcome, AuthState};
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Unlock with a PIN (read from stdin when --pin is omitted)
    Unlock {
        #[arg(long)]
        pin: Option<String>,
        /// Report a successful biometric match instead of a PIN
        #[arg(long, conflicts_with = "pin")]
        biometric: bool,
    },
    /// Print lockout state as JSON
    Status,
    /// Set or change the PIN
    SetPin {
        /// Current PIN; not needed before a PIN exists
        #[arg(long)]
        current: Option<String>,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::open()?;
    let gate = ctx.auth_gate();
    let now = Utc::now();

    match action {
        AuthAction::Unlock { pin, biometric } => {
            let outcome = if biometric {
                gate.attempt_biometric(now)?
            } else {
                let pin = match pin {
                    Some(pin) => pin,
                    None => read_pin()?,
                };
                gate.attempt(&pin, now)?
            };
            println!("{}", serde_json::to_string(&outcome)?);
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        AuthAction::Status => {
            let out = json!({
                "state": gate.state(now)?,
                "remaining_secs": gate.current_lockout(now)?,
                "failed_attempts": ctx.settings.failed_attempts()?,
                "max_failed_attempts": gate.policy().max_failed_attempts,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        AuthAction::SetPin { current, new, confirm } => {
            if gate.state(now)? != AuthState::PendingSetup {
                let current = current.ok_or("--current is required to change an existing PIN")?;
                match gate.attempt(&current, now)? {
                    AuthOutcome::Success { .. } => {}
                    other => return Err(format!("current PIN rejected: {}", serde_json::to_string(&other)?).into()),
                }
            }
            gate.change_pin(&new, &confirm)?;
            println!("PIN updated");
        }
    }
    Ok(())
}

fn read_pin() -> Result<String, Box<dyn Error>> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
