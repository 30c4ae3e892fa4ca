use std::io::Write;

use anima_core::{HostError, Notifier};
use chrono::Local;

/// Notification sink for terminals: prints to stdout. Permission follows
/// `notifications.enabled` in the config.
pub struct ConsoleNotifier {
    enabled: bool,
}

impl ConsoleNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for ConsoleNotifier {
    fn has_permission(&self) -> bool {
        self.enabled
    }

    fn post(&self, title: &str, body: &str) -> Result<bool, HostError> {
        if !self.enabled {
            return Ok(false);
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {title}: {body}", Local::now().format("%Y-%m-%d %H:%M"))
            .and_then(|_| out.flush())
            .map_err(|e| HostError::Backend(e.to_string()))?;
        Ok(true)
    }
}
