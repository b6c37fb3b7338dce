//! Terminal delivery for alerts and the badge.

use std::io::Write;
use std::sync::Mutex;

use briefwatch_engine::{NotificationService, NotifyError, ServiceFut};
use briefwatch_types::{Alert, AlertPriority};
use tracing::info;

/// Prints alerts as single lines. High-priority alerts ring the terminal bell.
pub struct TerminalNotifier<W> {
    out: Mutex<W>,
    /// Last badge shown, to print only changes.
    badge: Mutex<Option<Option<usize>>>,
}

impl TerminalNotifier<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            badge: Mutex::new(None),
        }
    }

    fn write_line(&self, line: &str) -> Result<(), NotifyError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| NotifyError::Delivery("output lock poisoned".to_string()))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap()
    }
}

pub fn format_alert(alert: &Alert) -> String {
    match alert.priority {
        AlertPriority::High => format!("\x07[!!] {}: {}", alert.title, alert.message),
        AlertPriority::Normal => format!("[!] {}: {}", alert.title, alert.message),
    }
}

fn format_badge(count: Option<usize>) -> String {
    match count {
        Some(n) => format!("[badge] {n}"),
        None => "[badge] cleared".to_string(),
    }
}

impl<W: Write + Send> NotificationService for TerminalNotifier<W> {
    fn show(&self, alert: Alert) -> ServiceFut<'_, (), NotifyError> {
        Box::pin(async move {
            info!(
                title = %alert.title,
                priority = alert.priority.level(),
                "Alert dispatched"
            );
            self.write_line(&format_alert(&alert))
        })
    }

    fn set_badge(&self, count: Option<usize>) -> ServiceFut<'_, (), NotifyError> {
        Box::pin(async move {
            let changed = {
                let mut last = self
                    .badge
                    .lock()
                    .map_err(|_| NotifyError::Delivery("badge lock poisoned".to_string()))?;
                let changed = *last != Some(count);
                *last = Some(count);
                changed
            };
            if changed {
                self.write_line(&format_badge(count))?;
            }
            Ok(())
        })
    }
}
