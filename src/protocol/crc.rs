//! # CRC Computation and Parsing
//!
//! The device maintains a CRC-16 over its loaded regions and templates.
//! The host reads it with the `^G|000000|` command and compares against a
//! locally computed value to verify that loaded objects survived a power
//! cycle intact.
//!
//! ## Response Frame (7 bytes)
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0 | `*` marker |
//! | 1 | `G` frame type |
//! | 2 | `\|` separator |
//! | 3 | CRC byte A |
//! | 4 | CRC byte B |
//! | 5 | `\|` separator |
//! | 6 | CR terminator |
//!
//! The two CRC bytes are byte-order dependent per vendor: JCM firmware
//! answers low byte first, Nanoptix high byte first. Both orders recover
//! the same numeric CRC from mirror-image frames.

use crate::protocol::commands::CRC_FRAME_LEN;

/// CRC byte ordering within the 7-byte response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcByteOrder {
    /// Low byte at offset 3, high byte at offset 4 (JCM/FutureLogic)
    LowFirst,
    /// High byte at offset 3, low byte at offset 4 (Nanoptix)
    HighFirst,
}

/// Expected CRC response marker
const CRC_MARKER: u8 = b'*';

/// Offset of the first CRC byte in the response
const CRC_DATA_OFFSET: usize = 3;

/// Compute CRC-16/CCITT-FALSE over a byte slice.
///
/// Polynomial 0x1021, initial value 0xFFFF, no reflection. This matches
/// the checksum the printer firmware maintains over its object flash.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Extract the 16-bit CRC from a raw response frame.
///
/// Returns `None` for short frames or a wrong marker byte; callers treat
/// that as "no usable response" and may retry.
pub fn parse_crc_response(raw: &[u8], order: CrcByteOrder) -> Option<u16> {
    if raw.len() < CRC_FRAME_LEN || raw[0] != CRC_MARKER || raw[1] != b'G' {
        return None;
    }
    let a = raw[CRC_DATA_OFFSET];
    let b = raw[CRC_DATA_OFFSET + 1];
    let value = match order {
        CrcByteOrder::LowFirst => u16::from_le_bytes([a, b]),
        CrcByteOrder::HighFirst => u16::from_be_bytes([a, b]),
    };
    Some(value)
}

/// Build a CRC response frame (test fixtures and simulators).
pub fn encode_crc_response(crc: u16, order: CrcByteOrder) -> Vec<u8> {
    let [low, high] = crc.to_le_bytes();
    let (a, b) = match order {
        CrcByteOrder::LowFirst => (low, high),
        CrcByteOrder::HighFirst => (high, low),
    };
    vec![CRC_MARKER, b'G', b'|', a, b, b'|', 0x0D]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_known_vector() {
        // CRC-16/CCITT-FALSE of "123456789" is 0x29B1.
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_parse_low_first() {
        let frame = vec![b'*', b'G', b'|', 0x34, 0x12, b'|', 0x0D];
        assert_eq!(parse_crc_response(&frame, CrcByteOrder::LowFirst), Some(0x1234));
    }

    #[test]
    fn test_parse_high_first() {
        let frame = vec![b'*', b'G', b'|', 0x12, 0x34, b'|', 0x0D];
        assert_eq!(parse_crc_response(&frame, CrcByteOrder::HighFirst), Some(0x1234));
    }

    #[test]
    fn test_mirror_frames_recover_same_value() {
        // JCM low-first and Nanoptix high-first frames carrying the same
        // CRC are byte mirrors of each other at the data offset.
        let jcm = encode_crc_response(0xBEEF, CrcByteOrder::LowFirst);
        let nanoptix = encode_crc_response(0xBEEF, CrcByteOrder::HighFirst);
        assert_eq!(jcm[3], nanoptix[4]);
        assert_eq!(jcm[4], nanoptix[3]);
        assert_eq!(parse_crc_response(&jcm, CrcByteOrder::LowFirst), Some(0xBEEF));
        assert_eq!(
            parse_crc_response(&nanoptix, CrcByteOrder::HighFirst),
            Some(0xBEEF)
        );
    }

    #[test]
    fn test_parse_rejects_bad_marker() {
        let frame = vec![b'#', b'G', b'|', 0x00, 0x00, b'|', 0x0D];
        assert_eq!(parse_crc_response(&frame, CrcByteOrder::LowFirst), None);
    }

    #[test]
    fn test_parse_rejects_short_frame() {
        let frame = vec![b'*', b'G', b'|', 0x00];
        assert_eq!(parse_crc_response(&frame, CrcByteOrder::LowFirst), None);
    }
}
