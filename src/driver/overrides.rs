//! # Printer-Defined Template Overrides
//!
//! Some installations ship tickets whose layout lives in the printer
//! configuration rather than the platform: a JSON override file maps
//! logical ticket IDs to ready-made region/template commands, selected by
//! firmware version. On the first opportunity after connect the driver
//! negotiates the set onto the device — delete everything loaded, then
//! transmit each override verbatim — and from then on prints resolve
//! through the negotiated map instead of the PDL compiler.
//!
//! Negotiation state is per driver instance. A reconnect or reset clears
//! it, so the set is re-sent to whatever device shows up next.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::TclError;
use crate::protocol::commands;
use crate::transport::Transport;

use super::TclDriver;

/// One override object: a pre-built region or template command.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideObject {
    /// Platform-side logical id (templates only; what tickets reference)
    #[serde(default)]
    pub logical_id: String,
    /// Vendor object id the command defines
    pub id: char,
    /// Complete wire command, transmitted verbatim
    pub command: String,
    /// Template contains a barcode region of interest
    #[serde(default)]
    pub has_barcode: bool,
}

/// The override set for one firmware family.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideSet {
    /// Firmware prefix this set applies to (e.g. `NAN`, `PSA2`)
    pub firmware: String,
    pub regions: Vec<OverrideObject>,
    pub templates: Vec<OverrideObject>,
}

/// All override sets from one configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct PrinterOverrides {
    pub sets: Vec<OverrideSet>,
}

impl PrinterOverrides {
    /// Parse an override configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, TclError> {
        serde_json::from_str(json)
            .map_err(|e| TclError::OverrideConfig(format!("invalid override JSON: {e}")))
    }

    /// Load an override configuration file.
    pub fn from_file(path: &Path) -> Result<Self, TclError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The set whose firmware prefix matches, longest prefix winning
    /// (`PSA2` beats `PSA` for a `PSA2...` device).
    pub fn set_for(&self, firmware: &str) -> Option<&OverrideSet> {
        self.sets
            .iter()
            .filter(|s| firmware.starts_with(&s.firmware))
            .max_by_key(|s| s.firmware.len())
    }
}

/// Resolved template reference held by the driver after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideTemplateRef {
    pub id: char,
    pub has_barcode: bool,
}

/// Per-connection negotiation latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationState {
    pub done: bool,
    pub in_progress: bool,
}

impl<T: Transport> TclDriver<T> {
    /// Negotiate the printer-defined override set onto the device.
    ///
    /// No-op unless printer-defined-template mode is active and this
    /// connection has not negotiated yet. The firmware must be known from
    /// a prior status poll to select the set. A system or command error
    /// during transmission aborts the whole negotiation; the next call
    /// starts over from the delete.
    pub fn check_for_new_regions_and_templates(
        &mut self,
        overrides: &PrinterOverrides,
    ) -> Result<bool, TclError> {
        if !self.use_printer_defined_templates || self.negotiation.done {
            return Ok(false);
        }
        let Some(firmware) = self.firmware.clone() else {
            debug!("firmware unknown; deferring override negotiation");
            return Ok(false);
        };
        let Some(set) = overrides.set_for(&firmware) else {
            warn!(%firmware, "no override set for firmware");
            return Ok(false);
        };
        let set = set.clone();

        self.negotiation.in_progress = true;
        let result = self.transmit_override_set(&set);
        self.negotiation.in_progress = false;

        match result {
            Ok(()) => {
                self.override_templates = set
                    .templates
                    .iter()
                    .map(|t| {
                        (
                            t.logical_id.clone(),
                            OverrideTemplateRef {
                                id: t.id,
                                has_barcode: t.has_barcode,
                            },
                        )
                    })
                    .collect();
                self.negotiation.done = true;
                info!(
                    firmware = %set.firmware,
                    regions = set.regions.len(),
                    templates = set.templates.len(),
                    "override set negotiated"
                );
                Ok(true)
            }
            Err(e) => {
                self.override_templates.clear();
                Err(e)
            }
        }
    }

    fn transmit_override_set(&mut self, set: &OverrideSet) -> Result<(), TclError> {
        self.transport.send(&commands::delete_all_regions())?;
        if !self.wait_until_not_busy()? {
            return Err(TclError::NegotiationFailed(
                "device busy after region delete".into(),
            ));
        }

        for object in set.regions.iter().chain(set.templates.iter()) {
            self.transport.send(object.command.as_bytes())?;
            if !self.wait_until_not_busy()? {
                return Err(TclError::NegotiationFailed(format!(
                    "device busy after override object {}",
                    object.id
                )));
            }
            let status = self.status();
            if status.system_error() || status.command_error() || status.data_error() {
                return Err(TclError::NegotiationFailed(format!(
                    "device rejected override object {}",
                    object.id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CancelToken;
    use crate::pdl::Ticket;
    use crate::protocol::status::encode_frame;
    use crate::transport::MockTransport;
    use crate::vendor::nanoptix;
    use pretty_assertions::assert_eq;

    const OVERRIDES_JSON: &str = r#"{
        "sets": [
            {
                "firmware": "NAN",
                "regions": [
                    { "id": "0", "command": "^R|0|0|60|16|400|80|1|1|1|0|I|^" }
                ],
                "templates": [
                    {
                        "logical_id": "cashout",
                        "id": "A",
                        "command": "^T|A|0|^",
                        "has_barcode": true
                    }
                ]
            }
        ]
    }"#;

    fn idle_frame() -> Vec<u8> {
        encode_frame("NAN300145", [0, 0, 0, 0, 0])
    }

    fn negotiated_driver() -> TclDriver<MockTransport> {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let mut d = TclDriver::new(MockTransport::new(), nanoptix::profile());
        d.set_use_printer_defined_templates(true);
        // Firmware poll, then a settle poll per transmitted object.
        d.transport_mut().queue_response(idle_frame());
        d.request_status().unwrap();
        for _ in 0..3 {
            d.transport_mut().queue_response(idle_frame());
        }
        assert!(d.check_for_new_regions_and_templates(&overrides).unwrap());
        d
    }

    #[test]
    fn test_parse_override_json() {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let set = overrides.set_for("NAN300145").unwrap();
        assert_eq!(set.regions.len(), 1);
        assert_eq!(set.templates[0].logical_id, "cashout");
        assert!(set.templates[0].has_barcode);
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert!(matches!(
            PrinterOverrides::from_json("{"),
            Err(TclError::OverrideConfig(_))
        ));
    }

    #[test]
    fn test_longest_firmware_prefix_wins() {
        let json = r#"{
            "sets": [
                { "firmware": "PSA", "regions": [], "templates": [] },
                { "firmware": "PSA2", "regions": [], "templates": [] }
            ]
        }"#;
        let overrides = PrinterOverrides::from_json(json).unwrap();
        assert_eq!(overrides.set_for("PSA200110").unwrap().firmware, "PSA2");
        assert_eq!(overrides.set_for("PSA100271").unwrap().firmware, "PSA");
        assert!(overrides.set_for("NAN300145").is_none());
    }

    #[test]
    fn test_negotiation_deletes_then_loads() {
        let mut d = negotiated_driver();
        let sent: Vec<Vec<u8>> = d.transport_mut().sent().to_vec();
        let delete = sent.iter().position(|s| s == b"^D|").unwrap();
        let region = sent.iter().position(|s| s.starts_with(b"^R|0|")).unwrap();
        let template = sent.iter().position(|s| s == b"^T|A|0|^").unwrap();
        assert!(delete < region && region < template);
    }

    #[test]
    fn test_negotiation_is_once_per_connection() {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let mut d = negotiated_driver();
        let sends = d.transport_mut().sent().len();
        // Second call is a no-op.
        assert!(!d.check_for_new_regions_and_templates(&overrides).unwrap());
        assert_eq!(d.transport_mut().sent().len(), sends);
    }

    #[test]
    fn test_reconnect_forces_renegotiation() {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let mut d = negotiated_driver();
        d.on_reconnect();

        d.transport_mut().queue_response(idle_frame());
        d.request_status().unwrap();
        for _ in 0..3 {
            d.transport_mut().queue_response(idle_frame());
        }
        assert!(d.check_for_new_regions_and_templates(&overrides).unwrap());
    }

    #[test]
    fn test_device_rejection_aborts_negotiation() {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let mut d = TclDriver::new(MockTransport::new(), nanoptix::profile());
        d.set_use_printer_defined_templates(true);
        d.transport_mut().queue_response(idle_frame());
        d.request_status().unwrap();

        // Delete settles, then the region load reports a command error.
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut()
            .queue_response(encode_frame("NAN300145", [0, 0, 0, 0x01, 0]));
        assert!(matches!(
            d.check_for_new_regions_and_templates(&overrides),
            Err(TclError::NegotiationFailed(_))
        ));

        // Not latched: the next attempt retries from the delete.
        for _ in 0..4 {
            d.transport_mut().queue_response(idle_frame());
        }
        assert!(d.check_for_new_regions_and_templates(&overrides).unwrap());
    }

    #[test]
    fn test_print_resolves_through_negotiated_map() {
        let mut d = negotiated_driver();
        let ticket = Ticket::new("cashout", vec!["0012345678".into()]);
        d.print_ticket(&ticket, CancelToken::new()).unwrap();
        assert!(d.transport_mut().did_send(b"^P|A|0012345678|^"));

        // Unknown logical id fails cleanly.
        let missing = Ticket::new("unknown", vec![]);
        assert!(matches!(
            d.print_ticket(&missing, CancelToken::new()),
            Err(TclError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_negotiation_skipped_in_platform_mode() {
        let overrides = PrinterOverrides::from_json(OVERRIDES_JSON).unwrap();
        let mut d = TclDriver::new(MockTransport::new(), nanoptix::profile());
        d.transport_mut().queue_response(idle_frame());
        d.request_status().unwrap();
        assert!(!d.check_for_new_regions_and_templates(&overrides).unwrap());
        assert!(!d.transport_mut().did_send(b"^D|"));
    }
}
