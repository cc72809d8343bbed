//! # Print Description Language (PDL) Descriptors
//!
//! Device-independent region/template descriptions consumed as input and
//! compiled into TCL commands. These arrive from the print-spooling layer
//! as "GDS" descriptors: `dpr` lines describe regions, `dpt` lines describe
//! templates.
//!
//! ## Textual Forms
//!
//! Region (`dpr`), space-delimited:
//!
//! ```text
//! <id> <x> <y> <dx> <dy> <type> <rotation> <justification> <attr> <font> <m1> <m2>
//! ```
//!
//! Template (`dpt`), space-delimited:
//!
//! ```text
//! <id> <region-id> <region-id> ...
//! ```
//!
//! Coordinates and extents are in device dots before vendor clamping.

use crate::error::TclError;

/// Print direction for a region, from the PDL rotation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// 0° - left to right (code 0)
    #[default]
    Right,
    /// 90° - top to bottom (code 1)
    Down,
    /// 180° - right to left (code 2)
    Left,
    /// 270° - bottom to top (code 3)
    Up,
}

impl Rotation {
    /// Decode a PDL rotation code. Unknown codes fall back to `Right`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Down,
            2 => Self::Left,
            3 => Self::Up,
            _ => Self::Right,
        }
    }

    /// The wire code transmitted in a region definition.
    pub fn code(&self) -> u8 {
        match self {
            Self::Right => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Up => 3,
        }
    }

    /// Whether this direction swaps the region's width and height on paper.
    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::Down | Self::Up)
    }
}

/// Text justification within a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

impl Justification {
    /// Decode a PDL justification code. Unknown codes fall back to `Left`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Center,
            2 => Self::Right,
            _ => Self::Left,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

/// A PDL region descriptor (`dpr`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDef {
    /// PDL-level region id (the caching key)
    pub id: String,
    /// Origin in dots, before vendor buffering/clamping
    pub x: u16,
    pub y: u16,
    /// Extent in dots along the print direction
    pub dx: u16,
    pub dy: u16,
    /// Region type: `T` text, `B` barcode
    pub kind: char,
    pub rotation: Rotation,
    pub justification: Justification,
    /// Vendor attribute string (barcode symbology, inversion flags)
    pub attribute: String,
    /// Generic (GDS) font number, mapped per vendor at compile time
    pub font: u8,
    /// Horizontal and vertical size multipliers
    pub multiplier1: u8,
    pub multiplier2: u8,
}

impl RegionDef {
    /// Barcode regions require validation tracking and vendor reordering.
    pub fn is_barcode(&self) -> bool {
        self.kind == 'B'
    }

    /// Parse the space-delimited `dpr` textual form.
    pub fn parse(line: &str) -> Result<Self, TclError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 12 {
            return Err(TclError::PdlParse(format!(
                "dpr expects 12 fields, got {}: {line:?}",
                parts.len()
            )));
        }

        let num = |s: &str, what: &str| -> Result<u16, TclError> {
            s.parse()
                .map_err(|_| TclError::PdlParse(format!("bad {what}: {s:?}")))
        };
        // Byte-sized fields must not truncate: 256 is a malformed
        // descriptor, not rotation 0.
        let byte = |s: &str, what: &str| -> Result<u8, TclError> {
            s.parse()
                .map_err(|_| TclError::PdlParse(format!("bad {what}: {s:?}")))
        };

        let kind = parts[5]
            .chars()
            .next()
            .ok_or_else(|| TclError::PdlParse("empty region type".into()))?;

        Ok(Self {
            id: parts[0].to_string(),
            x: num(parts[1], "x")?,
            y: num(parts[2], "y")?,
            dx: num(parts[3], "dx")?,
            dy: num(parts[4], "dy")?,
            kind,
            rotation: Rotation::from_code(byte(parts[6], "rotation")?),
            justification: Justification::from_code(byte(parts[7], "justification")?),
            attribute: parts[8].to_string(),
            font: byte(parts[9], "font")?,
            multiplier1: byte(parts[10], "multiplier")?,
            multiplier2: byte(parts[11], "multiplier")?,
        })
    }
}

/// A PDL template descriptor (`dpt`): an ordered region-id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDef {
    pub id: String,
    pub region_ids: Vec<String>,
}

impl TemplateDef {
    /// Parse the space-delimited `dpt` textual form.
    pub fn parse(line: &str) -> Result<Self, TclError> {
        let mut parts = line.split_whitespace();
        let id = parts
            .next()
            .ok_or_else(|| TclError::PdlParse("empty dpt line".into()))?
            .to_string();
        let region_ids: Vec<String> = parts.map(str::to_string).collect();
        if region_ids.is_empty() {
            return Err(TclError::PdlParse(format!(
                "template {id} references no regions"
            )));
        }
        Ok(Self { id, region_ids })
    }
}

/// A print job: a logical template reference plus ordered field data,
/// one field per region in the template's region order.
///
/// Audit tickets carry their 3-column payload alongside the logical id;
/// in printer-defined-template mode the driver renders that payload in
/// line mode instead of resolving a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub template_id: String,
    pub fields: Vec<String>,
    pub audit: Option<AuditTicket>,
}

impl Ticket {
    pub fn new(template_id: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            template_id: template_id.into(),
            fields,
            audit: None,
        }
    }

    pub fn audit(template_id: impl Into<String>, audit: AuditTicket) -> Self {
        Self {
            template_id: template_id.into(),
            fields: Vec::new(),
            audit: Some(audit),
        }
    }
}

/// The fixed-format 3-column audit ticket, rendered in line mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTicket {
    pub header: String,
    pub left: Vec<String>,
    pub center: Vec<String>,
    pub right: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================
