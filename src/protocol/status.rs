//! # Status Frame Decoding
//!
//! The printer answers an ENQ with a fixed 29-byte status frame. This module
//! decodes it into a [`TclStatus`] bitfield and the firmware version string.
//!
//! ## Frame Layout
//!
//! | Offset | Bytes | Content |
//! |--------|-------|---------|
//! | 0 | 1 | `*` status marker |
//! | 1 | 1 | `S` frame type |
//! | 2 | 1 | `\|` separator |
//! | 3 | 9 | Firmware version, ASCII (e.g. `NAN300145`) |
//! | 12 | 1 | `\|` separator |
//! | 13..=21 | 9 | 5 status bytes, each followed by `\|` (separators at 14, 16, 18, 20; trailing at 22) |
//! | 23 | 4 | Unit address, ASCII |
//! | 27 | 1 | `\|` separator |
//! | 28 | 1 | CR terminator |
//!
//! The five status bytes are composited little-endian into a 40-bit flag
//! word: byte 0 occupies bits 0..8, byte 1 bits 8..16, and so on. The
//! separator bytes between them are the "gaps" and carry no state.

use crate::protocol::commands::{CR, GROUP_SEPARATOR, STATUS_FRAME_LEN};

/// Byte offset of the status marker
pub const MARKER_OFFSET: usize = 0;

/// Expected status marker byte (`*`)
pub const STATUS_MARKER: u8 = b'*';

/// Byte range of the firmware version string
pub const FIRMWARE_RANGE: std::ops::Range<usize> = 3..12;

/// Offsets of the five status bytes within the frame
pub const STATUS_BYTE_OFFSETS: [usize; 5] = [13, 15, 17, 19, 21];

/// # Device Status Bitfield
///
/// A 40-bit flag word packed from the 5 status bytes of an enquiry response.
/// Refreshed on every status poll; drives all driver state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TclStatus {
    bits: u64,
}

impl TclStatus {
    // Byte 0 - printer state
    pub const BUSY: u64 = 0x0000_0000_01;
    pub const PRINTING: u64 = 0x0000_0000_02;
    pub const JOURNAL_PRINTING: u64 = 0x0000_0000_04;
    pub const TOP_OF_FORM: u64 = 0x0000_0000_08;
    pub const PAPER_IN_CHUTE: u64 = 0x0000_0000_10;

    // Byte 1 - paper path
    pub const PAPER_LOW: u64 = 0x0000_0001_00;
    pub const PAPER_EMPTY: u64 = 0x0000_0002_00;
    pub const PAPER_JAM: u64 = 0x0000_0004_00;

    // Byte 2 - head and chassis
    pub const PRINT_HEAD_OPEN: u64 = 0x0000_01_0000;
    pub const CHASSIS_OPEN: u64 = 0x0000_02_0000;
    pub const PRINT_HEAD_ERROR: u64 = 0x0000_04_0000;
    pub const VOLTAGE_ERROR: u64 = 0x0000_08_0000;
    pub const TEMPERATURE_ERROR: u64 = 0x0000_10_0000;

    // Byte 3 - command/system errors
    pub const COMMAND_ERROR: u64 = 0x0001_00_0000;
    pub const DATA_ERROR: u64 = 0x0002_00_0000;
    pub const SYSTEM_ERROR: u64 = 0x0004_00_0000;
    pub const BUFFER_OVERFLOW: u64 = 0x0008_00_0000;

    // Byte 4 - validation
    pub const VALIDATION_NUMBER_DONE: u64 = 0x01_0000_0000;
    pub const BARCODE_DATA_ACCESSED: u64 = 0x02_0000_0000;

    /// Composite the 5 raw status bytes little-endian into a flag word.
    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        let mut bits = 0u64;
        for (i, b) in bytes.iter().enumerate() {
            bits |= (*b as u64) << (8 * i);
        }
        Self { bits }
    }

    /// Raw 40-bit flag word.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    fn has(&self, mask: u64) -> bool {
        self.bits & mask != 0
    }

    pub fn busy(&self) -> bool {
        self.has(Self::BUSY)
    }

    pub fn printing(&self) -> bool {
        self.has(Self::PRINTING)
    }

    /// Journal (line) printing mode is active. Template mode is the inverse.
    pub fn journal_printing(&self) -> bool {
        self.has(Self::JOURNAL_PRINTING)
    }

    /// Template mode indicator (inverse of the journal-printing bit).
    pub fn template_mode(&self) -> bool {
        !self.journal_printing()
    }

    pub fn top_of_form(&self) -> bool {
        self.has(Self::TOP_OF_FORM)
    }

    pub fn paper_in_chute(&self) -> bool {
        self.has(Self::PAPER_IN_CHUTE)
    }

    pub fn paper_low(&self) -> bool {
        self.has(Self::PAPER_LOW)
    }

    pub fn paper_empty(&self) -> bool {
        self.has(Self::PAPER_EMPTY)
    }

    pub fn paper_jam(&self) -> bool {
        self.has(Self::PAPER_JAM)
    }

    pub fn print_head_open(&self) -> bool {
        self.has(Self::PRINT_HEAD_OPEN)
    }

    pub fn chassis_open(&self) -> bool {
        self.has(Self::CHASSIS_OPEN)
    }

    pub fn print_head_error(&self) -> bool {
        self.has(Self::PRINT_HEAD_ERROR)
    }

    pub fn command_error(&self) -> bool {
        self.has(Self::COMMAND_ERROR)
    }

    pub fn data_error(&self) -> bool {
        self.has(Self::DATA_ERROR)
    }

    pub fn system_error(&self) -> bool {
        self.has(Self::SYSTEM_ERROR)
    }

    pub fn validation_number_done(&self) -> bool {
        self.has(Self::VALIDATION_NUMBER_DONE)
    }

    pub fn barcode_data_accessed(&self) -> bool {
        self.has(Self::BARCODE_DATA_ACCESSED)
    }

    /// Validation is complete when the validation number is done or the
    /// barcode data has been read back by the host.
    pub fn validation_complete(&self) -> bool {
        self.validation_number_done() || self.barcode_data_accessed()
    }

    /// Any disabling hardware fault bit is set.
    pub fn any_fault(&self) -> bool {
        self.has(
            Self::PAPER_JAM
                | Self::PAPER_EMPTY
                | Self::PRINT_HEAD_OPEN
                | Self::CHASSIS_OPEN
                | Self::PRINT_HEAD_ERROR,
        )
    }
}

/// A decoded status frame: firmware version plus the status bitfield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFrame {
    pub firmware: String,
    pub status: TclStatus,
}

/// Decode a raw enquiry response.
///
/// Returns `None` if the frame is short, carries the wrong marker byte, or
/// the firmware field is not ASCII. Callers treat `None` as "no usable
/// status this poll" and retry on the next cycle.
pub fn decode_frame(raw: &[u8]) -> Option<StatusFrame> {
    if raw.len() < STATUS_FRAME_LEN {
        return None;
    }
    if raw[MARKER_OFFSET] != STATUS_MARKER {
        return None;
    }

    let firmware_bytes = &raw[FIRMWARE_RANGE];
    if !firmware_bytes.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    let firmware = String::from_utf8_lossy(firmware_bytes).into_owned();

    let mut bytes = [0u8; 5];
    for (i, offset) in STATUS_BYTE_OFFSETS.iter().enumerate() {
        bytes[i] = raw[*offset];
    }

    Some(StatusFrame {
        firmware,
        status: TclStatus::from_bytes(bytes),
    })
}

/// Build a status frame from its parts.
///
/// Used by test fixtures and device simulators; the inverse of
/// [`decode_frame`]. The firmware string is padded or truncated to the
/// 9-byte field.
pub fn encode_frame(firmware: &str, status_bytes: [u8; 5]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(STATUS_FRAME_LEN);
    frame.push(STATUS_MARKER);
    frame.push(b'S');
    frame.push(GROUP_SEPARATOR);

    let mut fw: Vec<u8> = firmware.bytes().take(9).collect();
    fw.resize(9, b'0');
    frame.extend_from_slice(&fw);
    frame.push(GROUP_SEPARATOR);

    for b in status_bytes {
        frame.push(b);
        frame.push(GROUP_SEPARATOR);
    }

    frame.extend_from_slice(b"0001");
    frame.push(GROUP_SEPARATOR);
    frame.push(CR);
    debug_assert_eq!(frame.len(), STATUS_FRAME_LEN);
    frame
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_roundtrip_layout() {
        let frame = encode_frame("NAN300145", [0, 0, 0, 0, 0]);
        assert_eq!(frame.len(), STATUS_FRAME_LEN);
        assert_eq!(frame[0], b'*');
        assert_eq!(frame[28], 0x0D);
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.firmware, "NAN300145");
        assert_eq!(decoded.status.bits(), 0);
    }

    #[test]
    fn test_decode_busy_fixture() {
        let frame = encode_frame("PSA100271", [0x03, 0, 0, 0, 0]);
        let decoded = decode_frame(&frame).unwrap();
        assert!(decoded.status.busy());
        assert!(decoded.status.printing());
        assert!(decoded.status.template_mode());
        assert!(!decoded.status.any_fault());
    }

    #[test]
    fn test_decode_validation_done_fixture() {
        let frame = encode_frame("PSA100271", [0x02, 0, 0, 0, 0x01]);
        let decoded = decode_frame(&frame).unwrap();
        assert!(decoded.status.printing());
        assert!(decoded.status.validation_number_done());
        assert!(decoded.status.validation_complete());
        assert!(!decoded.status.barcode_data_accessed());
    }

    #[test]
    fn test_decode_system_error_fixture() {
        let frame = encode_frame("PSA100271", [0, 0, 0, 0x04, 0]);
        let decoded = decode_frame(&frame).unwrap();
        assert!(decoded.status.system_error());
        assert!(!decoded.status.command_error());
        assert!(!decoded.status.data_error());
    }

    #[test]
    fn test_decode_rejects_wrong_marker() {
        let mut frame = encode_frame("PSA100271", [0, 0, 0, 0, 0]);
        frame[0] = b'#';
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let frame = encode_frame("PSA100271", [0, 0, 0, 0, 0]);
        assert_eq!(decode_frame(&frame[..28]), None);
    }

    #[test]
    fn test_status_bit_composition_little_endian() {
        // Byte 1 lands in bits 8..16, byte 4 in bits 32..40.
        let status = TclStatus::from_bytes([0x00, 0x04, 0x00, 0x00, 0x02]);
        assert!(status.paper_jam());
        assert!(status.barcode_data_accessed());
        assert_eq!(status.bits(), 0x02_0000_0400);
    }

    #[test]
    fn test_template_mode_is_inverse_of_journal() {
        let journal = TclStatus::from_bytes([0x04, 0, 0, 0, 0]);
        assert!(journal.journal_printing());
        assert!(!journal.template_mode());

        let template = TclStatus::from_bytes([0, 0, 0, 0, 0]);
        assert!(template.template_mode());
    }
}
