use std::io::{self, IsTerminal, Write};

use chrono::Local;
use serde::Serialize;

use crate::app::{Notification, NotificationLevel, NotificationSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Table,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// JSON mode keeps stdout machine-readable; notifications only reach the log.
impl NotificationSink for JsonOutput {
    fn notify(&self, notification: Notification) {
        tracing::debug!(
            level = ?notification.level,
            issued_at = %notification.issued_at.to_rfc3339(),
            title = %notification.title,
            description = %notification.description,
            "notification"
        );
    }
}

/// Prints notifications to stderr, coloured when stderr is a terminal.
pub struct StderrNotifier {
    color: bool,
}

impl StderrNotifier {
    pub fn new() -> Self {
        Self {
            color: io::stderr().is_terminal(),
        }
    }
}

impl Default for StderrNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for StderrNotifier {
    fn notify(&self, notification: Notification) {
        let line = format_notification(&notification, self.color);
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

/// One stderr line: local issue time, level icon, title and description.
pub fn format_notification(notification: &Notification, color: bool) -> String {
    let (icon, tint) = match notification.level {
        NotificationLevel::Info => ("✔", "\x1b[32m"),
        NotificationLevel::Warning => ("⚠", "\x1b[33m"),
        NotificationLevel::Error => ("✖", "\x1b[31m"),
    };
    let time = notification.issued_at.with_timezone(&Local).format("%H:%M:%S");
    if color {
        format!(
            "[{time}] {tint}{icon} {}\x1b[0m: {}",
            notification.title, notification.description
        )
    } else {
        format!("[{time}] {icon} {}: {}", notification.title, notification.description)
    }
}
