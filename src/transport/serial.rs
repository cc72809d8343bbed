//! # Serial Transport
//!
//! RS-232/USB-serial communication with a ticket printer using the
//! `serialport` crate. TCL printers ship configured for 9600 8N1; some
//! installations run 38400.
//!
//! Reads poll the port until the expected response length arrives or the
//! read timeout elapses. A timeout with no bytes is the normal "device
//! did not answer" case and returns an empty buffer.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crate::error::TclError;
use crate::transport::Transport;

/// Default baud rate for TCL ticket printers (9600 8N1).
pub const DEFAULT_BAUD: u32 = 9600;

/// Default receive timeout for status exchanges.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Default transmit timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A ticket printer connected over a serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialTransport {
    /// Open a serial port at the given path and baud rate.
    ///
    /// ## Parameters
    ///
    /// - `path`: e.g. `/dev/ttyUSB0`, `/dev/ttyS1`, `COM3`
    /// - `baud`: 9600 unless the installation says otherwise
    pub fn open(path: &str, baud: u32) -> Result<Self, TclError> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()
            .map_err(|e| TclError::Transport(format!("Failed to open {path}: {e}")))?;

        Ok(Self {
            port,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Open with the default TCL baud rate (9600 8N1).
    pub fn open_default(path: &str) -> Result<Self, TclError> {
        Self::open(path, DEFAULT_BAUD)
    }

    /// List available serial port names on the system.
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.port_name)
            .collect()
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), TclError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| TclError::Transport(format!("set_timeout failed: {e}")))
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TclError> {
        self.apply_timeout(self.write_timeout)?;
        self.port
            .write_all(data)
            .map_err(|e| TclError::Transport(format!("Write failed: {e}")))?;
        self.port
            .flush()
            .map_err(|e| TclError::Transport(format!("Flush failed: {e}")))?;
        Ok(())
    }

    fn send_and_receive(&mut self, data: &[u8], expect_len: usize) -> Result<Vec<u8>, TclError> {
        self.send(data)?;
        self.apply_timeout(self.read_timeout)?;

        let mut response = Vec::with_capacity(expect_len);
        let mut buf = [0u8; 64];
        let deadline = Instant::now() + self.read_timeout;

        while response.len() < expect_len {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let want = expect_len - response.len();
                    response.extend_from_slice(&buf[..n.min(want)]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TclError::Transport(format!("Read failed: {e}"))),
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        Ok(response)
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}

// Hardware-dependent; exercised manually against a connected printer.
// Protocol-level behavior is covered through MockTransport in the driver
// and integration tests.
