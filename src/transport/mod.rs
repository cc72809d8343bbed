//! # Printer Transport Layer
//!
//! Byte-oriented send/receive backends for talking to a ticket printer.
//! The driver owns its transport exclusively, so all device I/O is
//! serialized structurally — there is no shared handle to lock.
//!
//! ## Available Transports
//!
//! - [`serial`]: RS-232/USB-serial via the `serialport` crate
//! - [`mock`]: scripted exchanges for tests and simulators
//!
//! ## Timeout Semantics
//!
//! A read that produces no bytes before the read timeout is an *expected*
//! condition (the device simply had nothing to say) and surfaces as an
//! empty or short `Ok` buffer, never as an error. Errors are reserved for
//! hard transport failures (port gone, write refused).

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

use std::time::Duration;

use crate::error::TclError;

/// Byte-oriented command/response contract consumed by the driver.
pub trait Transport {
    /// Transmit a command. No response is expected.
    fn send(&mut self, data: &[u8]) -> Result<(), TclError>;

    /// Transmit a command and read up to `expect_len` response bytes.
    ///
    /// Returns whatever arrived before the read timeout; an empty buffer
    /// means the device did not answer.
    fn send_and_receive(&mut self, data: &[u8], expect_len: usize) -> Result<Vec<u8>, TclError>;

    /// Adjust the receive timeout (CRC reads legitimately take up to 40s).
    fn set_read_timeout(&mut self, timeout: Duration);

    /// Adjust the transmit timeout (large print payloads need up to 10s).
    fn set_write_timeout(&mut self, timeout: Duration);

    fn read_timeout(&self) -> Duration;

    fn write_timeout(&self) -> Duration;
}
