//! Monotonic stat counters.

use std::collections::BTreeMap;

/// Messages dispatched to a registered handler.
pub const HANDLED_MESSAGES: &str = "Handled messages";
/// Byte sequences that matched no command.
pub const UNHANDLED_MESSAGES: &str = "Unhandled messages";
/// Faults captured by [`crate::Diagnostics::log_exception`].
pub const EXCEPTIONS: &str = "Exceptions";

/// Named counters, created at zero on first use and never decremented.
#[derive(Debug, Default, Clone)]
pub struct StatCounters {
    counters: BTreeMap<String, u64>,
}

impl StatCounters {
    /// Create an empty counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to `name`, returning the new count.
    pub fn add(&mut self, name: &str, value: u64) -> u64 {
        if let Some(count) = self.counters.get_mut(name) {
            *count = count.saturating_add(value);
            return *count;
        }
        self.counters.insert(name.to_owned(), value);
        value
    }

    /// Current value of `name`, zero if never incremented.
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Iterate over all counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        let stats = StatCounters::new();
        assert_eq!(stats.get(HANDLED_MESSAGES), 0);
        assert_eq!(stats.iter().count(), 0);
    }

    #[test]
    fn test_add_accumulates() {
        let mut stats = StatCounters::new();
        assert_eq!(stats.add(HANDLED_MESSAGES, 1), 1);
        assert_eq!(stats.add(HANDLED_MESSAGES, 4), 5);
        assert_eq!(stats.add(EXCEPTIONS, 0), 0);
        assert_eq!(stats.get(HANDLED_MESSAGES), 5);
        assert_eq!(stats.snapshot().len(), 2);
    }

    #[test]
    fn test_first_add_creates_counter() {
        let mut stats = StatCounters::new();
        assert_eq!(stats.add("Pings", 3), 3);
        assert_eq!(stats.iter().collect::<Vec<_>>(), vec![("Pings", 3)]);
    }

    #[test]
    fn test_add_saturates() {
        let mut stats = StatCounters::new();
        stats.add("big", u64::MAX);
        assert_eq!(stats.add("big", 1), u64::MAX);
    }
}
