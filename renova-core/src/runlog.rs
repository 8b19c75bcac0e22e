use chrono::Local;
use serde::Serialize;

/// Severity of an operator-facing log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One entry of the run log shown to the operator. Entries form an
/// append-only sequence in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Delivery seam for run logs. The engine only knows how to emit; the
/// control layer decides whether entries land in a polling buffer, a
/// stream, or stdout.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: LogEntry);
}

/// Sink that only mirrors entries through `tracing`, for headless use.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", entry.message),
            LogLevel::Warning => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }
    }
}
