//! # Printable Objects and Vendor ID Allocation
//!
//! A [`PrintableObject`] is a region or template compiled to its vendor wire
//! form and addressable on the device by a single-character ID. Objects are
//! compiled once per distinct PDL id and cached for the life of the printer
//! connection; the caches are cleared whenever the device is reset,
//! reconnected, or switched to/from printer-defined-template mode.
//!
//! ## ID Space
//!
//! Vendor IDs are drawn from the printable range `'0'..='}'`, excluding the
//! protocol-reserved `=`, `^` and `|`, and are allocated walking the
//! sub-ranges digits → uppercase → lowercase. IDs must stay unique while
//! any allocated object remains loaded; running off the end of `'z'` is a
//! detectable error rather than a silent reuse of the last ID.

use crate::error::TclError;

/// A rendered, vendor-addressable unit: a region or a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintableObject {
    /// Single-character vendor ID, allocated sequentially
    pub id: char,
    /// Serialized command payload, ready to transmit
    pub command: Vec<u8>,
    /// Number of regions referenced (templates only; 0 for regions)
    pub region_count: usize,
}

impl PrintableObject {
    pub fn region(id: char, command: Vec<u8>) -> Self {
        Self {
            id,
            command,
            region_count: 0,
        }
    }

    pub fn template(id: char, command: Vec<u8>, region_count: usize) -> Self {
        Self {
            id,
            command,
            region_count,
        }
    }
}

/// Sequential allocator over the restricted vendor ID space.
///
/// Walks `'0'..='9'`, then `'A'..='Z'`, then `'a'..='z'`. The excluded
/// characters `=`, `^` and `|` never appear because they sit outside those
/// sub-ranges. Exhaustion returns [`TclError::IdSpaceExhausted`].
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Option<char>,
    issued: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: Some('0'),
            issued: 0,
        }
    }

    /// Allocate the next vendor ID.
    pub fn allocate(&mut self) -> Result<char, TclError> {
        let id = self
            .next
            .ok_or(TclError::IdSpaceExhausted(self.issued))?;
        self.next = Self::successor(id);
        self.issued += 1;
        Ok(id)
    }

    /// Number of IDs handed out since the last reset.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Return to the start of the ID space (device reset / reconnect).
    pub fn reset(&mut self) {
        self.next = Some('0');
        self.issued = 0;
    }

    fn successor(id: char) -> Option<char> {
        match id {
            '9' => Some('A'),
            'Z' => Some('a'),
            'z' => None,
            other => Some((other as u8 + 1) as char),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_allocation_order() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate().unwrap(), '0');
        for _ in 0..9 {
            alloc.allocate().unwrap();
        }
        // Digits exhausted, uppercase next.
        assert_eq!(alloc.allocate().unwrap(), 'A');
        for _ in 0..25 {
            alloc.allocate().unwrap();
        }
        // Uppercase exhausted, lowercase next.
        assert_eq!(alloc.allocate().unwrap(), 'a');
    }

    #[test]
    fn test_never_emits_reserved_and_never_repeats() {
        let mut alloc = IdAllocator::new();
        let mut seen = std::collections::HashSet::new();
        while let Ok(id) = alloc.allocate() {
            assert!(!matches!(id, '=' | '^' | '|'), "reserved id {id:?}");
            assert!(('0'..='}').contains(&id));
            assert!(seen.insert(id), "duplicate id {id:?}");
        }
        // 10 digits + 26 upper + 26 lower
        assert_eq!(seen.len(), 62);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut alloc = IdAllocator::new();
        for _ in 0..62 {
            alloc.allocate().unwrap();
        }
        match alloc.allocate() {
            Err(TclError::IdSpaceExhausted(n)) => assert_eq!(n, 62),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_reset_restarts_space() {
        let mut alloc = IdAllocator::new();
        for _ in 0..62 {
            alloc.allocate().unwrap();
        }
        alloc.reset();
        assert_eq!(alloc.allocate().unwrap(), '0');
        assert_eq!(alloc.issued(), 1);
    }

    #[test]
    fn test_printable_object_constructors() {
        let r = PrintableObject::region('0', b"^R|0|...".to_vec());
        assert_eq!(r.region_count, 0);
        let t = PrintableObject::template('A', b"^T|A|01|^".to_vec(), 2);
        assert_eq!(t.region_count, 2);
    }
}
