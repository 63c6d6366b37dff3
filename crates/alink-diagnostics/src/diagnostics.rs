//! Shared diagnostics handle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::fault::{capture_fault, CrashRecord, Fault};
use crate::memlog::{LogEntry, LogRing, Severity};
use crate::metric::metric_defs;
use crate::stats::{StatCounters, EXCEPTIONS};

struct Inner {
    stats: Mutex<StatCounters>,
    log: Mutex<LogRing>,
    booted_at: Instant,
}

/// Stat counters and in-memory log shared by the engine, the handlers and
/// scheduled tasks.
///
/// Cloning is cheap; every clone refers to the same counters and log. Log
/// text is also forwarded to `tracing`, and counter increments are mirrored
/// to the `metrics` facade.
#[derive(Clone)]
pub struct Diagnostics {
    inner: Arc<Inner>,
}

impl Diagnostics {
    /// Create diagnostics with a log budget of `log_capacity` characters.
    pub fn new(log_capacity: usize) -> Self {
        Diagnostics {
            inner: Arc::new(Inner {
                stats: Mutex::new(StatCounters::new()),
                log: Mutex::new(LogRing::new(log_capacity)),
                booted_at: Instant::now(),
            }),
        }
    }

    /// Increment a stat counter by one.
    pub fn inc(&self, stat: &str) {
        self.add(stat, 1);
    }

    /// Add `value` to a stat counter.
    pub fn add(&self, stat: &str, value: u64) {
        self.inner.stats.lock().add(stat, value);
        metrics::counter!(metric_defs::STATS.name, "stat" => stat.to_owned()).increment(value);
    }

    /// Current value of a stat counter.
    pub fn counter(&self, stat: &str) -> u64 {
        self.inner.stats.lock().get(stat)
    }

    /// Snapshot of all stat counters.
    pub fn read_counters(&self) -> BTreeMap<String, u64> {
        self.inner.stats.lock().snapshot()
    }

    /// Time since these diagnostics were created.
    pub fn uptime(&self) -> Duration {
        self.inner.booted_at.elapsed()
    }

    /// Append pre-formatted text to the log.
    pub fn log(&self, severity: Severity, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Info => tracing::info!(target: "alink", "{}", text),
            Severity::Warn => tracing::warn!(target: "alink", "{}", text),
            Severity::Error => tracing::error!(target: "alink", "{}", text),
        }

        let (evicted, retained) = {
            let mut log = self.inner.log.lock();
            let evicted = log.push(severity, text);
            (evicted, log.retained_chars())
        };

        metrics::counter!(metric_defs::LOG_ENTRIES.name, "severity" => severity.as_str())
            .increment(1);
        if evicted > 0 {
            metrics::counter!(metric_defs::LOG_EVICTED.name).increment(evicted as u64);
        }
        metrics::gauge!(metric_defs::LOG_RETAINED_CHARS.name).set(retained as f64);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(Severity::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(Severity::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(Severity::Error, text);
    }

    /// Structure a fault without recording it.
    pub fn capture_fault(&self, fault: &Fault) -> CrashRecord {
        capture_fault(fault)
    }

    /// Record a fault: counts it under "Exceptions" and logs the crash
    /// record at error level.
    pub fn log_exception(&self, fault: &Fault) -> CrashRecord {
        self.inc(EXCEPTIONS);
        let record = capture_fault(fault);
        self.error(format!("{}: {}", record.kind, record.message));
        self.error(format!("  {}()", record.function));
        self.error(format!("  {}", record.location()));
        record
    }

    /// Replay the log, oldest entry first.
    ///
    /// The log is snapshotted before `emit` runs, so the sink may itself log.
    pub fn dump(&self, mut emit: impl FnMut(Severity, &str)) {
        for entry in self.entries() {
            emit(entry.severity, &entry.text);
        }
    }

    /// Snapshot of the retained log entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.log.lock().iter().cloned().collect()
    }

    /// Uptime followed by every stat counter, one line each.
    pub fn stats_report(&self) -> Vec<String> {
        let seconds = self.uptime().as_secs();
        let mut lines = vec![format!("Uptime: {:02}:{:02}", seconds / 60, seconds % 60)];
        lines.extend(
            self.read_counters()
                .into_iter()
                .map(|(name, count)| format!("{}: {}", name, count)),
        );
        lines
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("counters", &self.read_counters())
            .field("log_entries", &self.inner.log.lock().len())
            .finish()
    }
}
