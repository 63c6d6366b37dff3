//! Diagnostics for the alink adapter.
//!
//! This crate provides the observability the protocol engine depends on:
//!
//! - [`StatCounters`]: named monotonic counters ("Handled messages", ...)
//! - [`LogRing`]: an in-memory log bounded by a character budget
//! - [`capture_fault`]: turns a handler or task fault into a [`CrashRecord`]
//! - [`Diagnostics`]: a cloneable handle bundling the above, mirroring
//!   counters to the `metrics` facade and log text to `tracing`
//!
//! # Example
//!
//! ```rust
//! use alink_diagnostics::{Diagnostics, Severity, HANDLED_MESSAGES};
//!
//! let diagnostics = Diagnostics::new(500);
//! diagnostics.inc(HANDLED_MESSAGES);
//! diagnostics.warn("22 15 05 00");
//!
//! assert_eq!(diagnostics.counter(HANDLED_MESSAGES), 1);
//! diagnostics.dump(|severity, text| assert_eq!(severity, Severity::Warn));
//! ```

pub use metrics;

mod diagnostics;
mod fault;
mod memlog;
mod metric;
mod stats;

pub use diagnostics::Diagnostics;
pub use fault::{
    capture_fault, install_panic_hook, CrashRecord, Fault, FaultOrigin, TraceFrame, TraceScanner,
};
pub use memlog::{LogEntry, LogRing, Severity};
pub use metric::{describe_metrics, metric_defs, Metric, MetricKind};
pub use stats::{StatCounters, EXCEPTIONS, HANDLED_MESSAGES, UNHANDLED_MESSAGES};
