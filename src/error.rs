//! # Error Types
//!
//! This module defines error types used throughout the tclprint library.
//!
//! Expected device-communication conditions (no response to an enquiry,
//! malformed status frame) are *not* errors — those surface as `Ok(false)`
//! or `Ok(None)` so callers can retry on the next poll. The variants here
//! cover transport hard failures and genuine protocol misuse.

use thiserror::Error;

/// Main error type for tclprint operations
#[derive(Debug, Error)]
pub enum TclError {
    /// Transport-level errors (port open, write failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid command or parameter
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// PDL descriptor could not be parsed
    #[error("PDL parse error: {0}")]
    PdlParse(String),

    /// The printable-object ID space ('0'-'9', 'A'-'Z', 'a'-'z') is exhausted
    #[error("Printable-object ID space exhausted ({0} IDs in use)")]
    IdSpaceExhausted(usize),

    /// A print referenced a template that was never defined
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// Printer-defined template negotiation aborted on a device error
    #[error("Template negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Override configuration could not be loaded
    #[error("Override config error: {0}")]
    OverrideConfig(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
