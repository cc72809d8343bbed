//! # Audit Ticket Rendering (Line Mode)
//!
//! Audit tickets bypass the template system entirely: they are rendered as
//! raw journal-mode lines with ESC control codes and ejected with a form
//! feed. The payload is a fixed 3-column layout — a centered header, then
//! rows assembled from the left/center/right columns — padded to the
//! firmware's minimum line count so the device tears at a full ticket.
//!
//! Every source cell passes through the profile's character substitution
//! before alignment; the line-mode fonts cannot print the currency glyphs
//! the template fonts handle, and substitution can change a cell's length.

use crate::pdl::AuditTicket;
use crate::protocol::commands;
use crate::vendor::VendorProfile;

/// Line-mode unit of measure used for audit tickets.
const AUDIT_UNIT_BASE: u8 = 4;

/// Render an audit ticket to its full line-mode byte stream.
///
/// The stream is self-contained: line-mode setup, header, 3-column body
/// padded to `min_audit_lines`, and the eject tail. The mode-switch/form-
/// feed order in the tail follows the profile quirk flag.
pub fn render(profile: &VendorProfile, ticket: &AuditTicket) -> Vec<u8> {
    let width = profile.audit_chars_per_line;
    let mut out = Vec::new();

    out.extend_from_slice(&commands::line_init());
    out.extend_from_slice(&commands::set_unit_base(AUDIT_UNIT_BASE));
    out.extend_from_slice(&commands::select_font(profile.audit_font));
    out.extend_from_slice(&commands::set_line_spacing(profile.audit_line_spacing));

    push_line(&mut out, &center(&profile.substitute_line(&ticket.header), width));

    let rows = ticket
        .left
        .len()
        .max(ticket.center.len())
        .max(ticket.right.len())
        .max(profile.min_audit_lines);
    for row in 0..rows {
        // Substitute per cell, before padding: stripping or rotating a
        // glyph afterwards would shift the column edges.
        let line = columns_line(
            &substituted_cell(profile, &ticket.left, row),
            &substituted_cell(profile, &ticket.center, row),
            &substituted_cell(profile, &ticket.right, row),
            width,
        );
        push_line(&mut out, &line);
    }

    if profile.template_mode_before_form_feed {
        out.extend_from_slice(&commands::template_mode());
        out.push(commands::FF);
    } else {
        out.push(commands::FF);
        out.extend_from_slice(&commands::template_mode());
    }
    out
}

fn substituted_cell(profile: &VendorProfile, column: &[String], row: usize) -> String {
    profile.substitute_line(column.get(row).map(String::as_str).unwrap_or(""))
}

fn push_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(commands::CR);
    out.push(commands::LF);
}

/// Center `text` within `width` characters (no padding on the right).
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let pad = (width - len) / 2;
    let mut line = " ".repeat(pad);
    line.push_str(text);
    line
}

/// Assemble one 3-column row: left-justified, centered, right-justified
/// within equal thirds of the line (the middle column absorbs the
/// remainder). Overlong cells are truncated to their column.
fn columns_line(left: &str, middle: &str, right: &str, width: usize) -> String {
    let col = width / 3;
    let mid_col = width - 2 * col;

    let mut line = String::with_capacity(width);
    line.push_str(&fit(left, col));
    line.push_str(&center_fixed(middle, mid_col));
    line.push_str(&fit_right(right, col));
    // Trailing spaces waste print time.
    line.truncate(line.trim_end().len());
    line
}

fn fit(text: &str, width: usize) -> String {
    let mut s: String = text.chars().take(width).collect();
    while s.chars().count() < width {
        s.push(' ');
    }
    s
}

fn fit_right(text: &str, width: usize) -> String {
    let s: String = text.chars().take(width).collect();
    let pad = width - s.chars().count();
    let mut line = " ".repeat(pad);
    line.push_str(&s);
    line
}

fn center_fixed(text: &str, width: usize) -> String {
    let s: String = text.chars().take(width).collect();
    let len = s.chars().count();
    let pad_left = (width - len) / 2;
    let pad_right = width - len - pad_left;
    let mut line = " ".repeat(pad_left);
    line.push_str(&s);
    line.push_str(&" ".repeat(pad_right));
    line
}

// ============================================================================
// TESTS
// ============================================================================
