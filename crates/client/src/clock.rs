//! Timestamps for display lines.

use chrono::Local;

/// Format used for reply annotations, e.g. `Mon Jan 01 00:00:00 +00:00 2024`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Z %Y";

/// Source of display timestamps.
pub trait Clock: Send {
    /// A freshly generated timestamp.
    fn timestamp(&self) -> String;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp(&self) -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// A clock that always reports the same timestamp.
#[derive(Debug, Clone)]
pub struct FixedClock(String);

impl FixedClock {
    /// A clock that always reports `timestamp`.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self(timestamp.into())
    }
}

impl Clock for FixedClock {
    fn timestamp(&self) -> String {
        self.0.clone()
    }
}
