//! Commands understood by the adapter.

use crate::constants::*;
use crate::error::ProtocolResult;
use crate::trie::Trie;

/// Handler selected by a recognized (or unrecognized) command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Ping request, answered with a fixed reply.
    Ping,
    /// Version query.
    Version,
    /// Locomotive speed and direction.
    LocoSpeed,
    /// Locomotive function bank state.
    LocoFunction,
    /// Select the current configuration variable.
    CvSelect,
    /// Read the current configuration variable.
    CvRead,
    /// Write a configuration variable.
    CvWrite,
    /// Byte sequence that matches no command.
    Unrecognized,
    /// Switch to the interactive debug menu.
    DebugEntry,
}

impl HandlerKind {
    /// Short handler name used in logs and crash records.
    pub const fn name(&self) -> &'static str {
        match self {
            HandlerKind::Ping => "ping",
            HandlerKind::Version => "version",
            HandlerKind::LocoSpeed => "loco_speed",
            HandlerKind::LocoFunction => "loco_function",
            HandlerKind::CvSelect => "cv_select",
            HandlerKind::CvRead => "cv_read",
            HandlerKind::CvWrite => "cv_write",
            HandlerKind::Unrecognized => "unrecognized",
            HandlerKind::DebugEntry => "debug_entry",
        }
    }

    /// Number of payload bytes the handler reads after the prefix, not
    /// counting the checksum byte.
    pub const fn payload_len(&self) -> usize {
        match self {
            HandlerKind::LocoSpeed | HandlerKind::LocoFunction => LOCO_ID_SIZE + 1,
            HandlerKind::CvSelect => 1,
            HandlerKind::CvWrite => 2,
            _ => 0,
        }
    }

    /// Whether the message ends with a checksum byte the handler must read.
    pub const fn has_checksum(&self) -> bool {
        self.payload_len() > 0
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Command prefixes and the handler each one selects.
pub const COMMAND_TABLE: &[(&[u8], HandlerKind)] = &[
    (CMD_CV_READ, HandlerKind::CvRead),
    (CMD_VERSION, HandlerKind::Version),
    (CMD_PING, HandlerKind::Ping),
    (CMD_CV_SELECT, HandlerKind::CvSelect),
    (CMD_CV_WRITE, HandlerKind::CvWrite),
    (CMD_LOCO_SPEED, HandlerKind::LocoSpeed),
    (CMD_LOCO_FUNCTION_BANK_1, HandlerKind::LocoFunction),
    (CMD_LOCO_FUNCTION_BANK_2, HandlerKind::LocoFunction),
    (CMD_LOCO_FUNCTION_BANK_3, HandlerKind::LocoFunction),
    (CMD_LOCO_FUNCTION_BANK_4, HandlerKind::LocoFunction),
    (CMD_LOCO_FUNCTION_BANK_5, HandlerKind::LocoFunction),
    (CMD_DEBUG, HandlerKind::DebugEntry),
];

/// Build the dispatch trie for [`COMMAND_TABLE`].
pub fn command_trie() -> ProtocolResult<Trie<HandlerKind>> {
    Trie::build(COMMAND_TABLE.iter().copied())
}

/// Decode a two byte locomotive id.
///
/// Long addresses carry [`LONG_ADDRESS_MARKER`] in the high byte, short
/// addresses use only the low byte.
pub fn decode_loco_id(bytes: [u8; LOCO_ID_SIZE]) -> u16 {
    let [high, low] = bytes;
    if high & LONG_ADDRESS_MARKER == LONG_ADDRESS_MARKER {
        (u16::from(high & !LONG_ADDRESS_MARKER) << 8) | u16::from(low)
    } else {
        u16::from(low)
    }
}

/// Decoded locomotive speed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed {
    /// Speed step.
    pub step: u8,
    /// Direction of travel.
    pub forward: bool,
}

impl From<u8> for Speed {
    fn from(byte: u8) -> Self {
        Speed {
            step: byte & SPEED_MASK,
            forward: byte & SPEED_FORWARD_BIT == SPEED_FORWARD_BIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::Step;

    #[test]
    fn test_command_table_builds() {
        let trie = command_trie().expect("command table is prefix free");
        for (sequence, kind) in COMMAND_TABLE {
            let mut walk = trie.walk();
            let (last, prefix) = sequence.split_last().unwrap();
            for byte in prefix {
                assert_eq!(walk.push(*byte), Step::Continue);
            }
            assert_eq!(walk.push(*last), Step::Matched(*kind));
        }
    }

    #[test]
    fn test_unrecognized_is_not_registered() {
        assert!(COMMAND_TABLE
            .iter()
            .all(|(_, kind)| *kind != HandlerKind::Unrecognized));
    }

    #[test]
    fn test_payload_lengths() {
        assert_eq!(HandlerKind::LocoSpeed.payload_len(), 3);
        assert_eq!(HandlerKind::CvWrite.payload_len(), 2);
        assert!(!HandlerKind::Ping.has_checksum());
        assert!(HandlerKind::CvSelect.has_checksum());
    }

    #[test]
    fn test_decode_short_loco_id() {
        assert_eq!(decode_loco_id([0x00, 0x03]), 3);
        assert_eq!(decode_loco_id([0x00, 0x63]), 99);
    }

    #[test]
    fn test_decode_long_loco_id() {
        assert_eq!(decode_loco_id([0xE7, 0x0F]), 9999);
        assert_eq!(decode_loco_id([0xC0, 0x64]), 100);
    }

    #[test]
    fn test_speed_byte() {
        assert_eq!(Speed::from(0x85), Speed { step: 5, forward: true });
        assert_eq!(Speed::from(0x05), Speed { step: 5, forward: false });
    }
}
