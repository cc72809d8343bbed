//! # TCL/NTL Protocol Implementation
//!
//! Low-level building blocks for the Template Command Language (TCL) used by
//! JCM/FutureLogic ticket printers and its Nanoptix variant ("NTL").
//!
//! ## Module Structure
//!
//! - [`commands`]: Fixed command byte sequences and field escaping
//! - [`status`]: Enquiry response decoding and the [`status::TclStatus`] bitfield
//! - [`crc`]: CRC-16 computation and CRC-read response parsing
//!
//! ## Protocol Overview
//!
//! TCL is a text/binary hybrid. Commands begin with the `^` marker, fields
//! are separated by the `|` group separator, and `~` escapes reserved
//! characters inside field data. The device is polled with a single ENQ
//! byte (0x05) and answers with a fixed-length status frame; print commands
//! themselves receive no response — completion is inferred from subsequent
//! status polls.

pub mod commands;
pub mod crc;
pub mod status;
