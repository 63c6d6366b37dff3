//! Checksum framing.
//!
//! Every message on the link, in either direction, ends with a single
//! checksum byte: the XOR of all preceding bytes of the message.
//!
//! ```text
//! +------------------+--------------------+----------+
//! | command prefix   | fixed payload      | checksum |
//! +------------------+--------------------+----------+
//! ```
//!
//! Replies carry no prefix, only payload and checksum.

use crate::error::{ProtocolError, ProtocolResult};

/// XOR of all bytes in `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Returns `true` if `claimed` is the checksum of `data`.
pub fn validate(data: &[u8], claimed: u8) -> bool {
    checksum(data) == claimed
}

/// Like [`validate`], but reports a mismatch as a [`ProtocolError`] carrying
/// the raw message so the caller can log it.
pub fn verify(data: &[u8], claimed: u8) -> ProtocolResult<()> {
    let expected = checksum(data);
    if expected == claimed {
        Ok(())
    } else {
        Err(ProtocolError::ChecksumMismatch {
            message: to_hex(data),
            expected,
            actual: claimed,
        })
    }
}

/// Build an outgoing frame: the payload followed by its checksum.
pub fn with_checksum(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// Format bytes as space separated upper case hex, e.g. `22 15 05`.
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_ping_reply_is_zero() {
        assert_eq!(checksum(&[0x62, 0x22, 0x40]), 0x00);
    }

    #[test]
    fn test_checksum_of_cv_select() {
        assert_eq!(checksum(&[0x22, 0x15, 0x05]), 0x32);
        assert!(validate(&[0x22, 0x15, 0x05], 0x32));
        assert!(!validate(&[0x22, 0x15, 0x05], 0x00));
    }

    #[test]
    fn test_checksum_of_empty_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_single_bit_flip_is_detected() {
        let payload = [0xE4, 0x13, 0xC0, 0x03, 0x85];
        let claimed = checksum(&payload);
        assert!(validate(&payload, claimed));

        for index in 0..payload.len() {
            for bit in 0..8 {
                let mut corrupted = payload;
                corrupted[index] ^= 1 << bit;
                assert!(
                    !validate(&corrupted, claimed),
                    "flip of bit {} in byte {} went unnoticed",
                    bit,
                    index
                );
            }
        }
    }

    #[test]
    fn test_verify_reports_raw_message() {
        let err = verify(&[0x22, 0x15, 0x05], 0x00).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ChecksumMismatch {
                message: "22 15 05".to_string(),
                expected: 0x32,
                actual: 0x00,
            }
        );
        assert!(verify(&[0x22, 0x15, 0x05], 0x32).is_ok());
    }

    #[test]
    fn test_with_checksum_appends_checksum() {
        assert_eq!(with_checksum(&[0x61, 0x02]), vec![0x61, 0x02, 0x63]);
        assert_eq!(with_checksum(&[0x62, 0x22, 0x40]), vec![0x62, 0x22, 0x40, 0x00]);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x22, 0x15, 0x0A]), "22 15 0A");
        assert_eq!(to_hex(&[]), "");
    }
}
