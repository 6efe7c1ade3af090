use chrono::{DateTime, Local};

/// Timestamp layout used in every log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Error,
}

/// A single log line, immutable once created.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub text: String,
    pub severity: Severity,
    pub created: DateTime<Local>,
}

impl LogEvent {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
            created: Local::now(),
        }
    }

    /// `[<timestamp>]: <text>\n`, with `ERROR: ` in front of error text.
    pub fn format_line(&self) -> String {
        let prefix = match self.severity {
            Severity::Error => "ERROR: ",
            Severity::Normal => "",
        };
        format!(
            "[{}]: {}{}\n",
            self.created.format(TIMESTAMP_FORMAT),
            prefix,
            self.text
        )
    }
}
