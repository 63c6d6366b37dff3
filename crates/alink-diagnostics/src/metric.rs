//! Metric names mirrored to the `metrics` facade.
//!
//! Nothing is exported unless the binary installs a recorder; without one the
//! `metrics` macros are no-ops.

use metrics::{describe_counter, describe_gauge, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// One exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
    /// Label key, for metrics split by a label.
    pub label: Option<&'static str>,
}

impl Metric {
    /// Register the help text with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, Unit::Count, self.help),
            MetricKind::Gauge => describe_gauge!(self.name, Unit::Count, self.help),
        }
    }
}

pub mod metric_defs {
    use super::{Metric, MetricKind};

    /// Mirror of every stat counter, labelled by stat name.
    pub const STATS: Metric = Metric {
        name: "alink.stats",
        kind: MetricKind::Counter,
        help: "Diagnostic stat counters",
        label: Some("stat"),
    };

    pub const LOG_ENTRIES: Metric = Metric {
        name: "alink.log.entries",
        kind: MetricKind::Counter,
        help: "Entries appended to the in-memory log",
        label: Some("severity"),
    };

    pub const LOG_EVICTED: Metric = Metric {
        name: "alink.log.evicted",
        kind: MetricKind::Counter,
        help: "Log entries evicted to stay within the character budget",
        label: None,
    };

    pub const LOG_RETAINED_CHARS: Metric = Metric {
        name: "alink.log.retained_chars",
        kind: MetricKind::Gauge,
        help: "Characters of text held by the in-memory log",
        label: None,
    };

    pub const ALL: [Metric; 4] = [STATS, LOG_ENTRIES, LOG_EVICTED, LOG_RETAINED_CHARS];
}

/// Describe every adapter metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in &metric_defs::ALL {
        metric.describe();
    }
}
