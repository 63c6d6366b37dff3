//! Error types for the adapter runtime.

use std::io;
use std::panic::Location;
use std::path::PathBuf;

use alink_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The input side of the link reached end of stream.
    #[error("link closed")]
    Closed,

    /// I/O error on the underlying link.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),

    /// Readiness poll reported an unexpected state.
    #[error("unexpected poll state 0x{0:04X}")]
    PollState(i16),
}

/// Errors loading or validating an [`crate::AdapterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The config file is not valid YAML for this schema.
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while running the protocol engine or one of its handlers.
///
/// Errors raised at run time carry the location they were raised at, for
/// crash records. Conversions from [`TransportError`] record the `?` site.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The link failed.
    #[error("{source}")]
    Transport {
        #[source]
        source: TransportError,
        location: &'static Location<'static>,
    },

    /// The command table could not be built.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A loco function command named a bank with no function mapping.
    #[error("no function mapping for bank 0x{bank:02X}")]
    UnmappedBank {
        bank: u8,
        location: &'static Location<'static>,
    },

    /// Fault raised on request from the debug menu.
    #[error("{message}")]
    TestFault {
        message: String,
        location: &'static Location<'static>,
    },
}

impl EngineError {
    #[track_caller]
    pub fn unmapped_bank(bank: u8) -> Self {
        EngineError::UnmappedBank {
            bank,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn test_fault(message: impl Into<String>) -> Self {
        EngineError::TestFault {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Short kind name used in crash records.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Transport { .. } => "TransportError",
            EngineError::Protocol(_) => "ProtocolError",
            EngineError::Config(_) => "ConfigError",
            EngineError::UnmappedBank { .. } => "UnmappedBank",
            EngineError::TestFault { .. } => "TestFault",
        }
    }

    /// Where the error was raised, when known.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            EngineError::Transport { location, .. }
            | EngineError::UnmappedBank { location, .. }
            | EngineError::TestFault { location, .. } => Some(location),
            EngineError::Protocol(_) | EngineError::Config(_) => None,
        }
    }

    /// Whether the link is gone and the engine must stop.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, EngineError::Transport { .. })
    }

    /// Whether the input side of the link reached end of stream.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            EngineError::Transport {
                source: TransportError::Closed,
                ..
            }
        )
    }
}

impl From<TransportError> for EngineError {
    #[track_caller]
    fn from(source: TransportError) -> Self {
        EngineError::Transport {
            source,
            location: Location::caller(),
        }
    }
}

/// Failure returned by a scheduled task.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    location: &'static Location<'static>,
}

impl TaskError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        TaskError {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Where the task raised the error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl From<EngineError> for TaskError {
    #[track_caller]
    fn from(error: EngineError) -> Self {
        let location = match error.location() {
            Some(location) => location,
            None => Location::caller(),
        };
        TaskError {
            message: error.to_string(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_kind() {
        assert_eq!(EngineError::unmapped_bank(0x24).kind(), "UnmappedBank");
        assert_eq!(
            EngineError::unmapped_bank(0x24).to_string(),
            "no function mapping for bank 0x24"
        );
        assert!(EngineError::from(TransportError::Closed).is_link_failure());
        assert!(EngineError::from(TransportError::Closed).is_closed());
        assert!(!EngineError::from(TransportError::PollState(8)).is_closed());
        assert!(!EngineError::test_fault("x").is_link_failure());
    }

    #[test]
    fn test_engine_error_records_raise_site() {
        let line = line!() + 1;
        let error = EngineError::unmapped_bank(0x21);
        let location = error.location().unwrap();
        assert!(location.file().ends_with("error.rs"));
        assert_eq!(location.line(), line);

        let error = EngineError::from(TransportError::PollState(8));
        assert!(error.location().unwrap().file().ends_with("error.rs"));
        assert!(EngineError::Config(ConfigError::Invalid("x".into()))
            .location()
            .is_none());
    }

    #[test]
    fn test_task_error_from_engine_error() {
        let line = line!() + 1;
        let engine_error = EngineError::test_fault("Test Exception");
        let error = TaskError::from(engine_error);
        assert_eq!(error.to_string(), "Test Exception");
        assert_eq!(error.location().line(), line);
    }
}
