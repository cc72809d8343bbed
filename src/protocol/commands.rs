//! # TCL Command Set
//!
//! Fixed command byte sequences for the TCL/NTL ticket printer protocol.
//!
//! ## Command Structure
//!
//! Template-mode commands are caret-framed:
//!
//! | Command | Bytes | Purpose |
//! |---------|-------|---------|
//! | Enquiry | `05` | Request a status frame |
//! | Initialize | `^@\|` | Reset printer to power-on defaults |
//! | Form feed | `^F\|` | Eject the current ticket |
//! | Template mode | `^M\|T\|` | Select template (ticket) printing |
//! | Journal mode | `^M\|J\|` | Select journal (line) printing |
//! | Clear errors | `^C\|` | Clear latched online errors |
//! | Delete regions | `^D\|` | Delete all loaded regions and templates |
//! | Abort barcode | `^A\|` | Abort an in-flight barcode print |
//! | CRC read | `^G\|000000\|` | Request flash CRC (slow, up to 40s) |
//!
//! Variable-length definitions (`^R`, `^T`) and prints (`^P`) are built by
//! the builders below: a header, `|`-separated fields, and a `|^` footer.
//!
//! ## Reserved Characters
//!
//! `~`, `^` and `|` are protocol-reserved. Field data containing them must
//! pass through [`escape_field`] before transmission; `~` acts as the
//! literal-next escape.
//!
//! ## Journal (Line) Mode
//!
//! Audit tickets bypass the template system and are rendered with ESC-based
//! line-mode control codes (`line_init`, `set_unit_base`, ...), plain text
//! lines terminated CR/LF, and a form feed.

/// ENQ - Status enquiry byte
pub const ENQ: u8 = 0x05;

/// `^` - Command marker (reserved)
pub const CMD_MARKER: u8 = b'^';

/// `|` - Group separator between command fields (reserved)
pub const GROUP_SEPARATOR: u8 = b'|';

/// `~` - Literal-next escape character (reserved)
pub const ESCAPE: u8 = b'~';

/// ESC - Line-mode control prefix
pub const ESC: u8 = 0x1B;

/// CR - Carriage return (line-mode line terminator, with LF)
pub const CR: u8 = 0x0D;

/// LF - Line feed
pub const LF: u8 = 0x0A;

/// FF - Form feed (ejects the ticket in line mode)
pub const FF: u8 = 0x0C;

/// Length of the fixed status frame returned for an ENQ
pub const STATUS_FRAME_LEN: usize = 29;

/// Length of the fixed CRC-read response frame
pub const CRC_FRAME_LEN: usize = 7;

// ============================================================================
// FIXED COMMANDS
// ============================================================================

/// Status enquiry (single ENQ byte)
#[inline]
pub fn enquiry() -> Vec<u8> {
    vec![ENQ]
}

/// Initialize printer to power-on defaults (`^@|`)
///
/// Clears the line buffer and any in-flight job. Loaded regions and
/// templates survive on the device, but the driver treats its caches as
/// invalid after sending this.
#[inline]
pub fn initialize() -> Vec<u8> {
    b"^@|".to_vec()
}

/// Form feed - eject the current ticket (`^F|`)
#[inline]
pub fn form_feed() -> Vec<u8> {
    b"^F|".to_vec()
}

/// Select template (ticket) printing mode (`^M|T|`)
#[inline]
pub fn template_mode() -> Vec<u8> {
    b"^M|T|".to_vec()
}

/// Select journal (line) printing mode (`^M|J|`)
#[inline]
pub fn journal_mode() -> Vec<u8> {
    b"^M|J|".to_vec()
}

/// Clear latched online errors (`^C|`)
#[inline]
pub fn clear_errors() -> Vec<u8> {
    b"^C|".to_vec()
}

/// Delete all regions and templates loaded on the device (`^D|`)
#[inline]
pub fn delete_all_regions() -> Vec<u8> {
    b"^D|".to_vec()
}

/// Abort an in-flight barcode print (`^A|`)
///
/// The only mid-job abort the protocol offers. Issued when a disabling
/// fault is detected while a barcode region of interest is outstanding.
#[inline]
pub fn abort_barcode_print() -> Vec<u8> {
    b"^A|".to_vec()
}

/// Request the device flash CRC (`^G|000000|`)
///
/// Marker `^`, command letter `G`, group separators `|`, and six `0`
/// placeholder bytes. The device recomputes the CRC over its loaded
/// objects before answering, which can legitimately take up to 40 seconds.
#[inline]
pub fn crc_read() -> Vec<u8> {
    b"^G|000000|".to_vec()
}

// ============================================================================
// LINE-MODE (JOURNAL) CONTROL CODES
// ============================================================================

/// Line-mode initialize (ESC @)
#[inline]
pub fn line_init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// Set line-mode unit of measure (ESC U n)
#[inline]
pub fn set_unit_base(n: u8) -> Vec<u8> {
    vec![ESC, b'U', n]
}

/// Select line-mode font (ESC F n)
#[inline]
pub fn select_font(n: u8) -> Vec<u8> {
    vec![ESC, b'F', n]
}

/// Set line-mode line spacing in dots (ESC L n)
#[inline]
pub fn set_line_spacing(n: u8) -> Vec<u8> {
    vec![ESC, b'L', n]
}

// ============================================================================
// VARIABLE COMMAND BUILDERS
// ============================================================================

/// Escape protocol-reserved characters in field data.
///
/// `~` becomes `~~`, `^` becomes `~^`, `|` becomes `~|`. Everything else
/// passes through unchanged.
///
/// ## Example
///
/// ```
/// use tclprint::protocol::commands::escape_field;
///
/// assert_eq!(escape_field("A|B"), "A~|B");
/// assert_eq!(escape_field("100%"), "100%");
/// ```
pub fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '~' | '^' | '|' => {
                out.push('~');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Build a region definition command.
///
/// `^R|<id>|<rot>|<x>|<y>|<w>|<h>|<font>|<m1>|<m2>|<just>|<attr>|^`
///
/// Geometry is in device dots, already clamped by the vendor profile.
#[allow(clippy::too_many_arguments)]
pub fn define_region(
    id: char,
    rotation: u8,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    font: u8,
    multiplier1: u8,
    multiplier2: u8,
    justification: u8,
    attribute: &str,
) -> Vec<u8> {
    format!(
        "^R|{id}|{rotation}|{x}|{y}|{width}|{height}|{font}|{multiplier1}|{multiplier2}|{justification}|{attribute}|^"
    )
    .into_bytes()
}

/// Build a template definition command.
///
/// `^T|<id>|<region ids>|^` — region IDs concatenated in print order.
pub fn define_template(id: char, region_ids: &[char]) -> Vec<u8> {
    let ids: String = region_ids.iter().collect();
    format!("^T|{id}|{ids}|^").into_bytes()
}

/// Build a print command for a previously defined template.
///
/// `^P|<template id>|<field>|<field>|...|^` — field values must already be
/// escaped with [`escape_field`]. No response is expected; completion is
/// inferred from status polls.
pub fn print_template(template_id: char, fields: &[String]) -> Vec<u8> {
    let mut cmd = format!("^P|{template_id}|");
    cmd.push_str(&fields.join("|"));
    cmd.push_str("|^");
    cmd.into_bytes()
}

// ============================================================================
// TESTS
// ============================================================================
