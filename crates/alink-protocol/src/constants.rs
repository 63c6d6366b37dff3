//! Protocol constants
//!
//! Command prefixes, reply codes and payload sizes used on the command
//! station link.

// ============================================================================
// Command Prefixes (host → adapter)
// ============================================================================

/// Read the currently selected configuration variable.
pub const CMD_CV_READ: &[u8] = &[0x21, 0x10, 0x31];
/// Query the adapter version.
pub const CMD_VERSION: &[u8] = &[0x21, 0x21, 0x00];
/// Ping request.
pub const CMD_PING: &[u8] = &[0x21, 0x24, 0x05];
/// Select a configuration variable. Followed by the CV index.
pub const CMD_CV_SELECT: &[u8] = &[0x22, 0x15];
/// Write a configuration variable. Followed by the CV index and value.
pub const CMD_CV_WRITE: &[u8] = &[0x23, 0x16];
/// Locomotive speed and direction. Followed by the loco id and speed byte.
pub const CMD_LOCO_SPEED: &[u8] = &[0xE4, 0x13];
/// Locomotive functions F0-F4.
pub const CMD_LOCO_FUNCTION_BANK_1: &[u8] = &[0xE4, 0x20];
/// Locomotive functions F5-F8.
pub const CMD_LOCO_FUNCTION_BANK_2: &[u8] = &[0xE4, 0x21];
/// Locomotive functions F9-F12.
pub const CMD_LOCO_FUNCTION_BANK_3: &[u8] = &[0xE4, 0x22];
/// Locomotive functions F13-F20.
pub const CMD_LOCO_FUNCTION_BANK_4: &[u8] = &[0xE4, 0x23];
/// Locomotive functions F21-F28.
pub const CMD_LOCO_FUNCTION_BANK_5: &[u8] = &[0xE4, 0x28];
/// Leave binary mode and open the text debug menu (`~`).
pub const CMD_DEBUG: &[u8] = &[b'~'];

// ============================================================================
// Reply Codes (adapter → host)
// ============================================================================

/// Ping reply payload.
pub const REPLY_PING: [u8; 3] = [0x62, 0x22, 0x40];
/// Header of the version reply: `63 21 <version> 01`.
pub const REPLY_VERSION_HEADER: [u8; 2] = [0x63, 0x21];
/// Trailing byte of the version reply.
pub const REPLY_VERSION_TRAILER: u8 = 0x01;
/// Header of the CV read reply: `63 14 <cv> <value>`.
pub const REPLY_CV_READ_HEADER: [u8; 2] = [0x63, 0x14];
/// First acknowledgement frame sent after a CV select or write.
pub const REPLY_CV_ACK_BUSY: [u8; 2] = [0x61, 0x02];
/// Second acknowledgement frame sent after a CV select or write.
pub const REPLY_CV_ACK_READY: [u8; 2] = [0x61, 0x01];

// ============================================================================
// Payload Sizes
// ============================================================================

/// Size of an encoded locomotive id.
pub const LOCO_ID_SIZE: usize = 2;
/// Marker bits in the high byte of a long (two byte) locomotive address.
pub const LONG_ADDRESS_MARKER: u8 = 0xC0;
/// Direction bit in the loco speed byte (set = forward).
pub const SPEED_FORWARD_BIT: u8 = 0x80;
/// Speed step mask in the loco speed byte.
pub const SPEED_MASK: u8 = 0x7F;
