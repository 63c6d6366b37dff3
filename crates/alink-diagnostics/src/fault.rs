//! Crash capture.
//!
//! A [`Fault`] describes something that went wrong inside a handler or a
//! scheduled task. [`capture_fault`] reduces it to a [`CrashRecord`]: kind,
//! message, source location and function.
//!
//! Where the location is known structurally (the panic hook saw it, or the
//! error recorded where it was raised) it is used directly.
//! Faults that only come with a textual trace are scanned line by line for
//! frames of the form
//!
//! ```text
//!   File "alink.py", line 142, in cv_select
//! ```
//!
//! and the last frame found, the innermost one, is reported.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, Location};
use std::sync::Once;

/// Compact description of a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashRecord {
    pub kind: String,
    pub message: String,
    pub file: String,
    pub line: Option<u32>,
    pub function: String,
}

impl CrashRecord {
    /// `file:line`, or just the file when the line is unknown.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }
}

/// Where a fault's location information comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultOrigin {
    /// Location known from the platform.
    Located { file: String, line: u32 },
    /// Only a textual trace is available.
    Trace(String),
    /// Nothing is known about the location.
    Unknown,
}

/// A raw fault, before it is structured into a [`CrashRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    kind: String,
    message: String,
    function: String,
    origin: FaultOrigin,
}

impl Fault {
    /// Wrap an error raised at `location`.
    ///
    /// Errors that do not know where they were raised pass `None` and are
    /// recorded with an unknown location.
    pub fn from_error<E>(
        kind: impl Into<String>,
        error: &E,
        function: impl Into<String>,
        location: Option<&'static Location<'static>>,
    ) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let origin = match location {
            Some(location) => FaultOrigin::Located {
                file: location.file().to_owned(),
                line: location.line(),
            },
            None => FaultOrigin::Unknown,
        };
        Fault {
            kind: kind.into(),
            message: error.to_string(),
            function: function.into(),
            origin,
        }
    }

    /// Wrap a panic payload caught with `catch_unwind`.
    ///
    /// Uses the location recorded by [`install_panic_hook`] on this thread,
    /// if any.
    pub fn from_panic(payload: &(dyn Any + Send), function: impl Into<String>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_owned()
        };

        let origin = match take_panic_site() {
            Some((file, line)) => FaultOrigin::Located { file, line },
            None => FaultOrigin::Unknown,
        };

        Fault {
            kind: "panic".to_owned(),
            message,
            function: function.into(),
            origin,
        }
    }

    /// A fault described by a textual trace.
    pub fn from_trace(
        kind: impl Into<String>,
        message: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Fault {
            kind: kind.into(),
            message: message.into(),
            function: String::new(),
            origin: FaultOrigin::Trace(trace.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> &FaultOrigin {
        &self.origin
    }
}

/// Structure a fault into a [`CrashRecord`].
pub fn capture_fault(fault: &Fault) -> CrashRecord {
    let mut record = CrashRecord {
        kind: fault.kind.clone(),
        message: fault.message.clone(),
        file: String::new(),
        line: None,
        function: fault.function.clone(),
    };

    match &fault.origin {
        FaultOrigin::Located { file, line } => {
            record.file = file.clone();
            record.line = Some(*line);
        }
        FaultOrigin::Trace(trace) => {
            let mut scanner = TraceScanner::new();
            // Writing into the scanner cannot fail.
            let _ = fmt::Write::write_str(&mut scanner, trace);
            if let Some(frame) = scanner.finish() {
                record.file = frame.file;
                record.line = Some(frame.line);
                record.function = frame.function;
            }
        }
        FaultOrigin::Unknown => {}
    }

    if record.file.is_empty() {
        record.file = "<unknown>".to_owned();
    }
    if record.function.is_empty() {
        record.function = "<unknown>".to_owned();
    }
    record
}

/// One stack frame recovered from a textual trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// Line oriented scanner over a fault trace stream.
///
/// Text is fed through [`fmt::Write`]; at every newline the accumulated line
/// is tested for a frame and the most recent match is kept.
#[derive(Debug, Default)]
pub struct TraceScanner {
    line: String,
    frame: Option<TraceFrame>,
}

impl TraceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_line(&mut self) {
        if let Some(frame) = parse_frame(&self.line) {
            self.frame = Some(frame);
        }
        self.line.clear();
    }

    /// Innermost frame seen before the end of the stream.
    pub fn finish(self) -> Option<TraceFrame> {
        self.frame
    }
}

impl fmt::Write for TraceScanner {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for c in text.chars() {
            if c == '\n' {
                self.on_line();
            } else {
                self.line.push(c);
            }
        }
        Ok(())
    }
}

/// Match `File "<path>" ... line <n> ... in <function>`.
fn parse_frame(line: &str) -> Option<TraceFrame> {
    const FILE_MARKER: &str = "File \"";
    const LINE_MARKER: &str = "line ";
    const FUNCTION_MARKER: &str = " in ";

    let rest = &line[line.find(FILE_MARKER)? + FILE_MARKER.len()..];
    let file_end = rest.find('"')?;
    let file = &rest[..file_end];
    if file.is_empty() {
        return None;
    }

    let rest = &rest[file_end + 1..];
    let rest = &rest[rest.find(LINE_MARKER)? + LINE_MARKER.len()..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let line_number = rest[..digits].parse().ok()?;

    let rest = &rest[digits..];
    let function = rest[rest.find(FUNCTION_MARKER)? + FUNCTION_MARKER.len()..].trim();
    if function.is_empty() {
        return None;
    }

    Some(TraceFrame {
        file: file.to_owned(),
        line: line_number,
        function: function.to_owned(),
    })
}

thread_local! {
    static PANIC_SITE: RefCell<Option<(String, u32)>> = const { RefCell::new(None) };
}

fn take_panic_site() -> Option<(String, u32)> {
    PANIC_SITE.with(|site| site.borrow_mut().take())
}

/// Install a panic hook that records each panic's location for
/// [`Fault::from_panic`], then defers to the previous hook.
///
/// Safe to call more than once; only the first call installs the hook.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                PANIC_SITE.with(|site| {
                    *site.borrow_mut() = Some((location.file().to_owned(), location.line()));
                });
            }
            previous(info);
        }));
    });
}
