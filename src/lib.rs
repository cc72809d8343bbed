//! # tclprint
//!
//! A driver for TCL-protocol casino ticket printers (JCM/FutureLogic TCL,
//! Nanoptix NTL) over a serial line.
//!
//! Tickets are described by device-independent PDL regions and templates,
//! compiled once per connection into single-character-addressed printer
//! objects, and printed by sending a template id plus field data. Device
//! state is tracked exclusively through ENQ status polling; print commands
//! themselves receive no response.
//!
//! ## Architecture
//!
//! | Layer | Module | Role |
//! |-------|--------|------|
//! | Driver | [`driver`] | Protocol state machine, caching compiler, fault mapping |
//! | Vendor | [`vendor`] | Per-model capability profiles (bounds, fonts, quirks) |
//! | Protocol | [`protocol`] | Command builders, status frames, CRC |
//! | PDL | [`pdl`] | Region/template/ticket descriptors |
//! | Transport | [`transport`] | Serial and mock byte backends |
//!
//! ## Example
//!
//! ```no_run
//! use tclprint::driver::{CancelToken, TclDriver};
//! use tclprint::pdl::{RegionDef, TemplateDef, Ticket};
//! use tclprint::transport::SerialTransport;
//! use tclprint::vendor::jcm;
//!
//! # fn main() -> Result<(), tclprint::TclError> {
//! let port = SerialTransport::open_default("/dev/ttyUSB0")?;
//! let mut driver = TclDriver::new(port, jcm::profile());
//!
//! driver.self_test()?;
//! driver.define_region(&RegionDef::parse("R01 10 20 300 40 T 0 1 N 3 1 1")?)?;
//! driver.define_template(&TemplateDef::parse("T01 R01")?)?;
//! driver.print_ticket(&Ticket::new("T01", vec!["$10.00".into()]), CancelToken::new())?;
//!
//! while driver.is_printing() {
//!     std::thread::sleep(driver.poll_interval());
//!     driver.request_status()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod objects;
pub mod pdl;
pub mod protocol;
pub mod transport;
pub mod vendor;

pub use driver::TclDriver;
pub use error::TclError;
pub use transport::SerialTransport;
pub use vendor::VendorProfile;
