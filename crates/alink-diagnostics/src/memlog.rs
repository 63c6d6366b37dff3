//! In-memory log bounded by a character budget.
//!
//! The budget counts characters of message text, not entries. When a new
//! entry would push the total over the budget, the oldest entries are evicted
//! first. There is no time based expiry.

use std::collections::VecDeque;

/// Log severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Convert to string for output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub text: String,
    chars: usize,
}

impl LogEntry {
    fn new(severity: Severity, text: String) -> Self {
        let chars = text.chars().count();
        LogEntry {
            severity,
            text,
            chars,
        }
    }

    /// Length of the text in characters.
    pub fn chars(&self) -> usize {
        self.chars
    }
}

/// Ring of log entries holding at most `capacity` characters of text.
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    retained: usize,
    capacity: usize,
}

impl LogRing {
    /// Create an empty ring with a budget of `capacity` characters.
    pub fn new(capacity: usize) -> Self {
        LogRing {
            entries: VecDeque::new(),
            retained: 0,
            capacity,
        }
    }

    /// Append an entry, evicting the oldest entries to make room.
    ///
    /// Text longer than the whole budget is truncated to fit. Returns the
    /// number of evicted entries.
    pub fn push(&mut self, severity: Severity, text: impl Into<String>) -> usize {
        let mut text = text.into();
        if let Some((cut, _)) = text.char_indices().nth(self.capacity) {
            text.truncate(cut);
        }
        let entry = LogEntry::new(severity, text);

        let mut evicted = 0;
        while self.retained + entry.chars > self.capacity {
            match self.entries.pop_front() {
                Some(old) => {
                    self.retained -= old.chars;
                    evicted += 1;
                }
                None => break,
            }
        }

        self.retained += entry.chars;
        self.entries.push_back(entry);
        evicted
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Characters of text currently retained.
    pub fn retained_chars(&self) -> usize {
        self.retained
    }

    /// Character budget.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
