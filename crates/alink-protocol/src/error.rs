//! Protocol error types.

use thiserror::Error;

/// Errors raised while building the command trie or validating frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A command table entry has no bytes.
    #[error("command sequence is empty")]
    EmptySequence,

    /// The same sequence was registered twice.
    #[error("command sequence [{sequence}] is registered twice")]
    DuplicateSequence {
        /// Hex of the offending sequence.
        sequence: String,
    },

    /// An already registered sequence is a strict prefix of the new one.
    #[error("command sequence [{sequence}] is shadowed by registered prefix [{prefix}]")]
    ShadowedByPrefix {
        /// Hex of the sequence being registered.
        sequence: String,
        /// Hex of the registered prefix.
        prefix: String,
    },

    /// The new sequence is a strict prefix of an already registered one.
    #[error("command sequence [{sequence}] is a prefix of a registered sequence")]
    PrefixOfExisting {
        /// Hex of the sequence being registered.
        sequence: String,
    },

    /// Trailing checksum does not match the message.
    #[error("checksum mismatch for [{message}]: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Hex of the message the checksum covers.
        message: String,
        /// Checksum computed over the message.
        expected: u8,
        /// Checksum byte that was received.
        actual: u8,
    },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::ShadowedByPrefix {
            sequence: "22 15 01".to_string(),
            prefix: "22 15".to_string(),
        };
        assert!(err.to_string().contains("[22 15]"));

        let err = ProtocolError::ChecksumMismatch {
            message: "22 15 05".to_string(),
            expected: 0x32,
            actual: 0x00,
        };
        assert!(err.to_string().contains("expected 0x32, got 0x00"));
    }
}
