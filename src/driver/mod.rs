//! # TCL Printer Driver
//!
//! The protocol state machine shared by every vendor: status polling,
//! region/template compilation and caching, print-job sequencing, CRC
//! verification, and fault mapping. Vendor variance is injected through a
//! [`VendorProfile`](crate::vendor::VendorProfile); device I/O goes through
//! an exclusively owned [`Transport`].
//!
//! ## Ownership and Ordering
//!
//! The driver owns its transport and every operation takes `&mut self`, so
//! all communication with the physical device is serialized structurally.
//! Callers that need to share a driver across threads wrap it themselves;
//! there is no interior locking to misuse. Status-dependent decisions are
//! always made against the most recently completed poll.
//!
//! ## Print Lifecycle
//!
//! ```text
//! Idle -> (define regions/templates) -> Printing
//!      -> [ValidationPending if a barcode region of interest is present]
//!      -> Complete | Faulted
//! ```
//!
//! A print command receives no response. [`TclDriver::request_status`] is
//! the single place state advances: completion, validation latching, fault
//! mapping and cooperative cancellation all happen at poll time. There is
//! no mid-transmission abort; once the bytes are out, the job runs to
//! completion from the device's perspective (the barcode-specific abort is
//! the one exception, used on disabling faults).

pub mod audit;
pub mod overrides;
mod priority;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TclError;
use crate::objects::{IdAllocator, PrintableObject};
use crate::pdl::{AuditTicket, RegionDef, TemplateDef, Ticket};
use crate::protocol::commands;
use crate::protocol::crc;
use crate::protocol::status::{self, TclStatus};
use crate::transport::Transport;
use crate::vendor::VendorProfile;

/// Status poll cadence while idle
pub const NORMAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Status poll cadence while a print job is in flight
pub const PRINTING_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Busy-wait retry budget for [`TclDriver::wait_until_not_busy`]
pub const BUSY_RETRY_COUNT: u32 = 5;

/// Delay between busy-wait retries
pub const BUSY_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Write timeout while transmitting a print payload
pub const PRINT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Receive timeout for a CRC read (the device recomputes before answering)
pub const CRC_READ_TIMEOUT: Duration = Duration::from_secs(40);

/// Cooperative cancellation handle for an in-flight print job.
///
/// Cancellation is observed at poll granularity only: the next
/// [`TclDriver::request_status`] after [`cancel`](CancelToken::cancel)
/// clears the printing state without marking completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress of the in-flight print job, for the external reporting layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketPrintStatus {
    pub print_in_progress: bool,
    pub print_complete: bool,
    /// The barcode region of interest validated (one-shot per job)
    pub field_of_interest1: bool,
}

/// Hardware condition snapshot, refreshed by fault mapping after the first
/// completed self-test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrinterStatus {
    pub paper_in_chute: bool,
    pub paper_low: bool,
    pub chassis_open: bool,
    pub print_head_open: bool,
    pub paper_jam: bool,
    pub paper_empty: bool,
    pub top_of_form: bool,
}

impl PrinterStatus {
    /// A condition that should disable printing until an operator clears it.
    pub fn is_disabling(&self) -> bool {
        self.paper_jam || self.chassis_open || self.print_head_open || self.paper_empty
    }
}

/// Cached region: compiled object plus what the print path needs to know.
#[derive(Debug, Clone)]
struct RegionEntry {
    object: PrintableObject,
    is_barcode: bool,
}

/// Cached template: compiled object plus the barcode mask of its regions
/// in original PDL order (drives field reordering at print time).
#[derive(Debug, Clone)]
struct TemplateEntry {
    object: PrintableObject,
    barcode_mask: Vec<bool>,
}

/// The vendor-agnostic TCL protocol driver.
pub struct TclDriver<T: Transport> {
    transport: T,
    profile: VendorProfile,
    use_printer_defined_templates: bool,

    regions: HashMap<String, RegionEntry>,
    templates: HashMap<String, TemplateEntry>,
    loaded_regions: HashSet<char>,
    loaded_templates: HashSet<char>,
    region_ids: IdAllocator,
    template_ids: IdAllocator,

    /// Logical ticket id to vendor template id, from override negotiation
    override_templates: HashMap<String, overrides::OverrideTemplateRef>,
    negotiation: overrides::NegotiationState,

    firmware: Option<String>,
    status: TclStatus,
    poll_interval: Duration,

    // In-flight job flags, mutated only at poll/issue time.
    is_printing: bool,
    validation_reported: bool,
    wait_for_region_of_interest: bool,
    top_of_form: bool,
    template_mode: bool,
    self_test_done: bool,
    cancel: Option<CancelToken>,

    ticket_status: TicketPrintStatus,
    printer_status: PrinterStatus,
}

impl<T: Transport> TclDriver<T> {
    /// Create a driver over an exclusively owned transport.
    pub fn new(transport: T, profile: VendorProfile) -> Self {
        Self {
            transport,
            profile,
            use_printer_defined_templates: false,
            regions: HashMap::new(),
            templates: HashMap::new(),
            loaded_regions: HashSet::new(),
            loaded_templates: HashSet::new(),
            region_ids: IdAllocator::new(),
            template_ids: IdAllocator::new(),
            override_templates: HashMap::new(),
            negotiation: overrides::NegotiationState::default(),
            firmware: None,
            status: TclStatus::default(),
            poll_interval: NORMAL_POLL_INTERVAL,
            is_printing: false,
            validation_reported: false,
            wait_for_region_of_interest: false,
            top_of_form: false,
            template_mode: true,
            self_test_done: false,
            cancel: None,
            ticket_status: TicketPrintStatus::default(),
            printer_status: PrinterStatus::default(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors for the external reporting layer
    // ------------------------------------------------------------------

    pub fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    /// Replace the vendor profile (firmware identified after connect).
    /// Compiled objects depend on profile geometry, so the caches drop.
    pub fn set_profile(&mut self, profile: VendorProfile) {
        self.profile = profile;
        self.clear_object_caches();
    }

    /// Most recently decoded status bitfield (stale until the next poll).
    pub fn status(&self) -> TclStatus {
        self.status
    }

    pub fn ticket_print_status(&self) -> TicketPrintStatus {
        self.ticket_status
    }

    pub fn printer_status(&self) -> PrinterStatus {
        self.printer_status
    }

    pub fn firmware(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    pub fn is_printing(&self) -> bool {
        self.is_printing
    }

    pub fn is_template_mode(&self) -> bool {
        self.template_mode
    }

    pub fn is_top_of_form(&self) -> bool {
        self.top_of_form
    }

    /// Poll cadence the external scheduler should use right now.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Direct transport access for tests and simulators.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ------------------------------------------------------------------
    // Status polling
    // ------------------------------------------------------------------

    /// Poll the device and advance the print state machine.
    ///
    /// Returns `Ok(false)` when the device does not answer or answers with
    /// a malformed frame; all driver state is left stale for the caller to
    /// retry on the next poll cycle. `Err` is reserved for transport hard
    /// failures.
    pub fn request_status(&mut self) -> Result<bool, TclError> {
        let raw = self
            .transport
            .send_and_receive(&commands::enquiry(), commands::STATUS_FRAME_LEN)?;
        let Some(frame) = status::decode_frame(&raw) else {
            debug!(len = raw.len(), "no usable status frame");
            return Ok(false);
        };

        self.firmware = Some(frame.firmware);
        self.status = frame.status;
        self.template_mode = frame.status.template_mode();
        self.top_of_form = frame.status.top_of_form();

        if frame.status.system_error() || frame.status.command_error() {
            warn!(
                system = frame.status.system_error(),
                command = frame.status.command_error(),
                "device reported error status"
            );
        }

        // One-shot validation latch for the barcode region of interest.
        if self.is_printing && frame.status.validation_complete() && !self.validation_reported {
            self.validation_reported = true;
            self.wait_for_region_of_interest = false;
            self.ticket_status.field_of_interest1 = true;
            debug!("validation complete for region of interest");
        }

        // Cooperative cancellation: abort the printing state, no completion.
        if self.is_printing
            && self
                .cancel
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
        {
            debug!("print cancelled at poll");
            self.is_printing = false;
            self.wait_for_region_of_interest = false;
            self.cancel = None;
            self.ticket_status.print_in_progress = false;
            self.poll_interval = NORMAL_POLL_INTERVAL;
        } else if self.is_printing
            && !frame.status.busy()
            && !self.wait_for_region_of_interest
            && self.template_mode
        {
            debug!("print complete");
            self.is_printing = false;
            self.cancel = None;
            self.ticket_status.print_in_progress = false;
            self.ticket_status.print_complete = true;
            self.poll_interval = NORMAL_POLL_INTERVAL;
        }

        if self.self_test_done {
            self.map_faults()?;
        }

        Ok(true)
    }

    /// Map raw status bits into [`PrinterStatus`], applying the vendor
    /// suppression rules, and react to disabling faults.
    fn map_faults(&mut self) -> Result<(), TclError> {
        let s = self.status;
        self.printer_status = PrinterStatus {
            paper_in_chute: s.paper_in_chute(),
            paper_low: s.paper_low(),
            chassis_open: s.chassis_open(),
            print_head_open: s.print_head_open(),
            paper_jam: s.paper_jam(),
            // Paper empty is only meaningful when the device is not mid-print
            // and the head is healthy; otherwise the bit flickers.
            paper_empty: s.paper_empty() && !s.printing() && !s.print_head_error(),
            top_of_form: s.top_of_form(),
        };

        if self.printer_status.is_disabling()
            && self.is_printing
            && self.wait_for_region_of_interest
        {
            warn!("disabling fault while awaiting barcode validation; aborting barcode print");
            self.transport.send(&commands::abort_barcode_print())?;
            self.is_printing = false;
            self.wait_for_region_of_interest = false;
            self.cancel = None;
            self.ticket_status.print_in_progress = false;
            self.poll_interval = NORMAL_POLL_INTERVAL;
        }
        Ok(())
    }

    /// Poll until the device reports not-busy, up to 5 retries at 100ms.
    ///
    /// Returns `Ok(false)` if the device is still busy (or silent) after
    /// the retry budget; there is no backoff beyond the fixed delay.
    pub fn wait_until_not_busy(&mut self) -> Result<bool, TclError> {
        for attempt in 0..BUSY_RETRY_COUNT {
            if self.request_status()? && !self.status.busy() {
                return Ok(true);
            }
            if attempt + 1 < BUSY_RETRY_COUNT {
                thread::sleep(BUSY_RETRY_DELAY);
            }
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Region/template definition (caching compiler)
    // ------------------------------------------------------------------

    /// Compile a PDL region and ensure it is loaded on the device.
    ///
    /// The first call for a PDL id computes geometry, allocates a vendor
    /// ID and caches the compiled command; later calls are cache hits and
    /// transmit nothing unless the earlier load failed with a data error.
    pub fn define_region(&mut self, def: &RegionDef) -> Result<char, TclError> {
        if !self.regions.contains_key(&def.id) {
            let geometry = self.profile.region_geometry(def);
            let id = self.region_ids.allocate()?;
            let command = commands::define_region(
                id,
                def.rotation.code(),
                geometry.x,
                geometry.y,
                geometry.width,
                geometry.height,
                self.profile.mapped_font(def.font),
                def.multiplier1,
                def.multiplier2,
                def.justification.code(),
                &def.attribute,
            );
            debug!(pdl_id = %def.id, vendor_id = %id, "compiled region");
            self.regions.insert(
                def.id.clone(),
                RegionEntry {
                    object: PrintableObject::region(id, command),
                    is_barcode: def.is_barcode(),
                },
            );
        }

        let (vendor_id, command) = {
            let entry = &self.regions[&def.id];
            (entry.object.id, entry.object.command.clone())
        };

        if !self.loaded_regions.contains(&vendor_id) && self.transmit_definition(&command)? {
            self.loaded_regions.insert(vendor_id);
        }
        Ok(vendor_id)
    }

    /// Compile a PDL template and ensure it is loaded on the device.
    ///
    /// Region order may be rewritten per the vendor profile (barcode
    /// regions last); the same reordering is applied to field data when
    /// the template is printed. All referenced regions must have been
    /// defined first.
    pub fn define_template(&mut self, def: &TemplateDef) -> Result<char, TclError> {
        if !self.templates.contains_key(&def.id) {
            let mut refs = Vec::with_capacity(def.region_ids.len());
            let mut barcode_mask = Vec::with_capacity(def.region_ids.len());
            for region_id in &def.region_ids {
                let entry = self.regions.get(region_id).ok_or_else(|| {
                    TclError::InvalidCommand(format!(
                        "template {} references undefined region {}",
                        def.id, region_id
                    ))
                })?;
                refs.push((entry.object.id, entry.is_barcode));
                barcode_mask.push(entry.is_barcode);
            }

            if self.profile.barcode_regions_last {
                refs = reorder_barcode_last(refs, |r| r.1);
            }
            let vendor_region_ids: Vec<char> = refs.iter().map(|r| r.0).collect();

            let id = self.template_ids.allocate()?;
            let command = commands::define_template(id, &vendor_region_ids);
            debug!(pdl_id = %def.id, vendor_id = %id, regions = refs.len(), "compiled template");
            self.templates.insert(
                def.id.clone(),
                TemplateEntry {
                    object: PrintableObject::template(id, command, refs.len()),
                    barcode_mask,
                },
            );
        }

        let (vendor_id, command) = {
            let entry = &self.templates[&def.id];
            (entry.object.id, entry.object.command.clone())
        };

        if !self.loaded_templates.contains(&vendor_id) && self.transmit_definition(&command)? {
            self.loaded_templates.insert(vendor_id);
        }
        Ok(vendor_id)
    }

    /// Send a definition and confirm the device accepted it.
    ///
    /// Success means not-busy with no data-error bit. On a data error the
    /// online errors are cleared and the object stays un-loaded so the
    /// next use retries the transmission.
    fn transmit_definition(&mut self, command: &[u8]) -> Result<bool, TclError> {
        self.transport.send(command)?;
        if !self.wait_until_not_busy()? {
            warn!("device still busy after definition");
            return Ok(false);
        }
        if self.status.data_error() {
            warn!("data error after definition; clearing online errors");
            self.transport.send(&commands::clear_errors())?;
            return Ok(false);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    /// Render and transmit a print job, then track it to completion via
    /// subsequent [`request_status`](Self::request_status) polls.
    ///
    /// In printer-defined-template mode the ticket is remapped through the
    /// negotiated override set, with the 3-column audit ticket falling
    /// back to raw line-mode rendering.
    pub fn print_ticket(&mut self, ticket: &Ticket, cancel: CancelToken) -> Result<(), TclError> {
        if self.use_printer_defined_templates {
            if let Some(audit) = &ticket.audit {
                return self.print_audit_ticket(audit, cancel);
            }
            return self.print_override_ticket(ticket, cancel);
        }
        self.print_platform_ticket(ticket, cancel)
    }

    /// Platform-defined path: previously compiled template + field data.
    fn print_platform_ticket(
        &mut self,
        ticket: &Ticket,
        cancel: CancelToken,
    ) -> Result<(), TclError> {
        let entry = self
            .templates
            .get(&ticket.template_id)
            .ok_or_else(|| TclError::UnknownTemplate(ticket.template_id.clone()))?;
        let template_id = entry.object.id;
        let barcode_mask = entry.barcode_mask.clone();

        let mut fields: Vec<(String, bool)> = ticket
            .fields
            .iter()
            .enumerate()
            .map(|(i, value)| {
                (
                    commands::escape_field(value),
                    barcode_mask.get(i).copied().unwrap_or(false),
                )
            })
            .collect();
        if self.profile.barcode_regions_last {
            fields = reorder_barcode_last(fields, |f| f.1);
        }
        let has_region_of_interest = fields.iter().any(|f| f.1);
        let field_values: Vec<String> = fields.into_iter().map(|f| f.0).collect();

        let command = commands::print_template(template_id, &field_values);
        self.transmit_print(&command, cancel, has_region_of_interest)
    }

    /// Printer-defined path: remap the logical id through the override set.
    fn print_override_ticket(
        &mut self,
        ticket: &Ticket,
        cancel: CancelToken,
    ) -> Result<(), TclError> {
        let template = self
            .override_templates
            .get(&ticket.template_id)
            .copied()
            .ok_or_else(|| TclError::UnknownTemplate(ticket.template_id.clone()))?;
        let fields: Vec<String> = ticket
            .fields
            .iter()
            .map(|f| commands::escape_field(f))
            .collect();
        let command = commands::print_template(template.id, &fields);
        self.transmit_print(&command, cancel, template.has_barcode)
    }

    /// Render and transmit an audit ticket in journal (line) mode.
    ///
    /// The rendered stream carries its own mode-switch tail, so completion
    /// is still detected by the template-mode poll condition once the
    /// device finishes ejecting. Cancellation is observed at poll time,
    /// the same as for template prints.
    pub fn print_audit_ticket(
        &mut self,
        ticket: &AuditTicket,
        cancel: CancelToken,
    ) -> Result<(), TclError> {
        let stream = audit::render(&self.profile, ticket);

        self.validation_reported = false;
        self.wait_for_region_of_interest = false;
        self.ticket_status = TicketPrintStatus {
            print_in_progress: true,
            print_complete: false,
            field_of_interest1: false,
        };
        self.is_printing = true;
        self.cancel = Some(cancel);

        self.transport.send(&commands::journal_mode())?;
        self.template_mode = false;

        let previous = self.transport.write_timeout();
        self.transport.set_write_timeout(PRINT_WRITE_TIMEOUT);
        let sent = self.transport.send(&stream);
        self.transport.set_write_timeout(previous);
        if let Err(e) = sent {
            self.is_printing = false;
            self.cancel = None;
            self.ticket_status.print_in_progress = false;
            return Err(e);
        }

        self.poll_interval = PRINTING_POLL_INTERVAL;
        debug!(lines = ticket.left.len().max(ticket.center.len()).max(ticket.right.len()), "audit ticket transmitted");
        Ok(())
    }

    /// Common transmission tail for both print paths.
    fn transmit_print(
        &mut self,
        command: &[u8],
        cancel: CancelToken,
        has_region_of_interest: bool,
    ) -> Result<(), TclError> {
        // Fresh job: clear the one-shot latches.
        self.validation_reported = false;
        self.wait_for_region_of_interest = has_region_of_interest;
        self.ticket_status = TicketPrintStatus {
            print_in_progress: true,
            print_complete: false,
            field_of_interest1: false,
        };
        self.is_printing = true;
        self.cancel = Some(cancel);

        // Force template mode; completion detection depends on it.
        self.transport.send(&commands::template_mode())?;
        self.template_mode = true;

        let previous = self.transport.write_timeout();
        self.transport.set_write_timeout(PRINT_WRITE_TIMEOUT);
        let sent = self.transport.send(command);
        self.transport.set_write_timeout(previous);
        if let Err(e) = sent {
            self.is_printing = false;
            self.cancel = None;
            self.ticket_status.print_in_progress = false;
            return Err(e);
        }

        self.poll_interval = PRINTING_POLL_INTERVAL;
        debug!(roi = has_region_of_interest, "print transmitted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Self-test, CRC, reset
    // ------------------------------------------------------------------

    /// Eject the current ticket with a template-mode form feed.
    ///
    /// Operator recovery: pushes out a partially printed ticket after a
    /// cleared jam or an aborted job. Receives no response.
    pub fn form_feed(&mut self) -> Result<(), TclError> {
        self.transport.send(&commands::form_feed())
    }

    /// Run the power-up self-test: initialize the device and verify it
    /// settles with no system/command error. Fault mapping stays inactive
    /// until this has completed once.
    pub fn self_test(&mut self) -> Result<bool, TclError> {
        // Force a fresh status view before deciding anything.
        if !self.request_status()? {
            return Ok(false);
        }
        self.transport.send(&commands::initialize())?;
        self.clear_object_caches();

        if !self.wait_until_not_busy()? {
            return Ok(false);
        }
        if self.status.system_error() || self.status.command_error() {
            warn!("self-test failed: device error after initialize");
            return Ok(false);
        }
        self.self_test_done = true;
        Ok(true)
    }

    /// Read the device flash CRC.
    ///
    /// Forces a fresh status read, widens the receive timeout to 40s (the
    /// device recomputes before answering) and boosts the sending thread's
    /// priority for the duration of the exchange. `Ok(None)` means no
    /// usable response.
    pub fn read_crc(&mut self) -> Result<Option<u16>, TclError> {
        if !self.request_status()? {
            return Ok(None);
        }

        let previous = self.transport.read_timeout();
        self.transport.set_read_timeout(CRC_READ_TIMEOUT);
        let raw = {
            let _boost = priority::PriorityBoost::acquire();
            self.transport
                .send_and_receive(&commands::crc_read(), commands::CRC_FRAME_LEN)
        };
        self.transport.set_read_timeout(previous);

        let raw = raw?;
        Ok(crc::parse_crc_response(&raw, self.profile.crc_order))
    }

    /// CRC-16 over every loaded object's command payload, in vendor ID
    /// order — the value the device is expected to report.
    pub fn expected_crc(&self) -> u16 {
        let mut loaded: Vec<&PrintableObject> = self
            .regions
            .values()
            .map(|e| &e.object)
            .filter(|o| self.loaded_regions.contains(&o.id))
            .chain(
                self.templates
                    .values()
                    .map(|e| &e.object)
                    .filter(|o| self.loaded_templates.contains(&o.id)),
            )
            .collect();
        loaded.sort_by_key(|o| o.id);

        let mut payload = Vec::new();
        for object in loaded {
            payload.extend_from_slice(&object.command);
        }
        crc::crc16(&payload)
    }

    /// Compare the device-reported CRC against [`expected_crc`](Self::expected_crc).
    /// `Ok(None)` if the device did not answer.
    pub fn verify_loaded_objects(&mut self) -> Result<Option<bool>, TclError> {
        let reported = self.read_crc()?;
        Ok(reported.map(|value| value == self.expected_crc()))
    }

    /// Initialize the device and drop all connection-scoped state: object
    /// caches, ID allocators, session flags and negotiation latches.
    pub fn reset(&mut self) -> Result<(), TclError> {
        self.transport.send(&commands::initialize())?;
        self.on_reconnect();
        Ok(())
    }

    /// Forget all connection-scoped state without touching the device
    /// (the physical connection was torn down and re-established).
    pub fn on_reconnect(&mut self) {
        self.clear_object_caches();
        self.is_printing = false;
        self.validation_reported = false;
        self.wait_for_region_of_interest = false;
        self.self_test_done = false;
        self.cancel = None;
        self.ticket_status = TicketPrintStatus::default();
        self.printer_status = PrinterStatus::default();
        self.poll_interval = NORMAL_POLL_INTERVAL;
        self.negotiation = overrides::NegotiationState::default();
        self.override_templates.clear();
    }

    /// Switch between platform-compiled and printer-defined templates.
    /// Crossing the boundary invalidates every cached object.
    pub fn set_use_printer_defined_templates(&mut self, enabled: bool) {
        if self.use_printer_defined_templates != enabled {
            self.use_printer_defined_templates = enabled;
            self.clear_object_caches();
            self.negotiation = overrides::NegotiationState::default();
            self.override_templates.clear();
        }
    }

    pub fn use_printer_defined_templates(&self) -> bool {
        self.use_printer_defined_templates
    }

    fn clear_object_caches(&mut self) {
        self.regions.clear();
        self.templates.clear();
        self.loaded_regions.clear();
        self.loaded_templates.clear();
        self.region_ids.reset();
        self.template_ids.reset();
    }
}

/// Stable partition: everything non-barcode first, barcode entries last,
/// preserving relative order within each group.
fn reorder_barcode_last<E>(entries: Vec<E>, is_barcode: impl Fn(&E) -> bool) -> Vec<E> {
    let (barcode, text): (Vec<E>, Vec<E>) = entries.into_iter().partition(|e| is_barcode(e));
    let mut out = text;
    out.extend(barcode);
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdl::{Justification, Rotation};
    use crate::protocol::status::encode_frame;
    use crate::transport::MockTransport;
    use crate::vendor::{jcm, nanoptix};
    use pretty_assertions::assert_eq;

    fn driver(profile: VendorProfile) -> TclDriver<MockTransport> {
        TclDriver::new(MockTransport::new(), profile)
    }

    fn idle_frame() -> Vec<u8> {
        encode_frame("PSA100271", [0, 0, 0, 0, 0])
    }

    fn region_def(id: &str, barcode: bool) -> RegionDef {
        RegionDef {
            id: id.into(),
            x: 10,
            y: 10,
            dx: 200,
            dy: 40,
            kind: if barcode { 'B' } else { 'T' },
            rotation: Rotation::Right,
            justification: Justification::Left,
            attribute: "N".into(),
            font: 1,
            multiplier1: 1,
            multiplier2: 1,
        }
    }

    #[test]
    fn test_request_status_no_response_returns_false() {
        let mut d = driver(jcm::profile());
        assert!(!d.request_status().unwrap());
        // State stays stale.
        assert_eq!(d.firmware(), None);
    }

    #[test]
    fn test_request_status_wrong_marker_returns_false() {
        let mut d = driver(jcm::profile());
        let mut frame = idle_frame();
        frame[0] = b'#';
        d.transport_mut().queue_response(frame);
        assert!(!d.request_status().unwrap());
    }

    #[test]
    fn test_request_status_decodes_firmware() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        assert!(d.request_status().unwrap());
        assert_eq!(d.firmware(), Some("PSA100271"));
        assert!(d.is_template_mode());
    }

    #[test]
    fn test_request_status_idempotent_when_unchanged() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        assert!(d.request_status().unwrap());
        let printing = d.is_printing();
        let template_mode = d.is_template_mode();
        let status = d.status();
        let ticket = d.ticket_print_status();
        assert!(d.request_status().unwrap());
        assert_eq!(d.is_printing(), printing);
        assert_eq!(d.is_template_mode(), template_mode);
        assert_eq!(d.status(), status);
        assert_eq!(d.ticket_print_status(), ticket);
    }

    #[test]
    fn test_define_region_cache_hit_skips_retransmit() {
        let mut d = driver(jcm::profile());
        // First definition: transmit + busy-wait poll.
        d.transport_mut().queue_response(idle_frame());
        let id1 = d.define_region(&region_def("R1", false)).unwrap();
        let sends_after_first = d.transport_mut().sent().len();

        let id2 = d.define_region(&region_def("R1", false)).unwrap();
        assert_eq!(id1, id2);
        // Cache hit: nothing new on the wire.
        assert_eq!(d.transport_mut().sent().len(), sends_after_first);
    }

    #[test]
    fn test_define_region_data_error_forces_retry() {
        let mut d = driver(jcm::profile());
        // Data error on first load attempt.
        d.transport_mut()
            .queue_response(encode_frame("PSA100271", [0, 0, 0, 0x02, 0]));
        let id1 = d.define_region(&region_def("R1", false)).unwrap();
        assert!(d.transport_mut().did_send(b"^C|"));

        // Second use retries the transmission and succeeds.
        d.transport_mut().queue_response(idle_frame());
        let id2 = d.define_region(&region_def("R1", false)).unwrap();
        assert_eq!(id1, id2);
        let region_cmd_sends = d
            .transport_mut()
            .sent()
            .iter()
            .filter(|s| s.starts_with(b"^R|"))
            .count();
        assert_eq!(region_cmd_sends, 2);
    }

    #[test]
    fn test_define_template_requires_regions() {
        let mut d = driver(jcm::profile());
        let def = TemplateDef {
            id: "T1".into(),
            region_ids: vec!["missing".into()],
        };
        assert!(matches!(
            d.define_template(&def),
            Err(TclError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_nanoptix_template_puts_barcode_regions_last() {
        let mut d = driver(nanoptix::profile());
        let nan_idle = encode_frame("NAN300145", [0, 0, 0, 0, 0]);
        d.transport_mut().queue_response(nan_idle.clone());
        d.transport_mut().queue_response(nan_idle.clone());
        d.transport_mut().queue_response(nan_idle.clone());
        let barcode_id = d.define_region(&region_def("RB", true)).unwrap();
        let text_id = d.define_region(&region_def("RT", false)).unwrap();

        let def = TemplateDef {
            id: "T1".into(),
            region_ids: vec!["RB".into(), "RT".into()],
        };
        d.define_template(&def).unwrap();

        let expected = commands::define_template('0', &[text_id, barcode_id]);
        assert!(d.transport_mut().did_send(&expected));
    }

    #[test]
    fn test_print_unknown_template_errors() {
        let mut d = driver(jcm::profile());
        let ticket = Ticket::new("nope", vec![]);
        assert!(matches!(
            d.print_ticket(&ticket, CancelToken::new()),
            Err(TclError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_print_escapes_reserved_characters() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        d.define_region(&region_def("R1", false)).unwrap();
        d.define_template(&TemplateDef {
            id: "T1".into(),
            region_ids: vec!["R1".into()],
        })
        .unwrap();

        let ticket = Ticket::new("T1", vec!["A|B^C~D".into()]);
        d.print_ticket(&ticket, CancelToken::new()).unwrap();
        assert!(d.transport_mut().did_send(b"^P|0|A~|B~^C~~D|^"));
    }

    #[test]
    fn test_print_forces_template_mode_and_fast_polling() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        d.define_region(&region_def("R1", false)).unwrap();
        d.define_template(&TemplateDef {
            id: "T1".into(),
            region_ids: vec!["R1".into()],
        })
        .unwrap();

        let ticket = Ticket::new("T1", vec!["X".into()]);
        d.print_ticket(&ticket, CancelToken::new()).unwrap();
        assert!(d.transport_mut().did_send(b"^M|T|"));
        assert!(d.is_printing());
        assert_eq!(d.poll_interval(), PRINTING_POLL_INTERVAL);
        assert!(d.ticket_print_status().print_in_progress);
        assert!(!d.ticket_print_status().print_complete);
    }

    #[test]
    fn test_cancellation_observed_at_poll_time() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        d.define_region(&region_def("R1", false)).unwrap();
        d.define_template(&TemplateDef {
            id: "T1".into(),
            region_ids: vec!["R1".into()],
        })
        .unwrap();

        let cancel = CancelToken::new();
        d.print_ticket(&Ticket::new("T1", vec!["X".into()]), cancel.clone())
            .unwrap();
        cancel.cancel();

        // Device reports idle, but the cancelled job must not complete.
        d.transport_mut().queue_response(idle_frame());
        assert!(d.request_status().unwrap());
        assert!(!d.is_printing());
        assert!(!d.ticket_print_status().print_complete);
        assert!(!d.ticket_print_status().print_in_progress);
        assert_eq!(d.poll_interval(), NORMAL_POLL_INTERVAL);
    }

    #[test]
    fn test_audit_cancellation_observed_at_poll_time() {
        let mut d = driver(jcm::profile());
        let cancel = CancelToken::new();
        d.print_audit_ticket(&AuditTicket::default(), cancel.clone())
            .unwrap();
        assert!(d.is_printing());
        cancel.cancel();

        // Device back in template mode and idle, but the cancelled audit
        // job must not report completion.
        d.transport_mut().queue_response(idle_frame());
        assert!(d.request_status().unwrap());
        assert!(!d.is_printing());
        assert!(!d.ticket_print_status().print_complete);
        assert!(!d.ticket_print_status().print_in_progress);
        assert_eq!(d.poll_interval(), NORMAL_POLL_INTERVAL);
    }

    #[test]
    fn test_self_test_gates_fault_mapping() {
        let mut d = driver(jcm::profile());
        // Paper jam reported before self-test: not mapped.
        d.transport_mut()
            .queue_response(encode_frame("PSA100271", [0, 0x04, 0, 0, 0]));
        assert!(d.request_status().unwrap());
        assert!(!d.printer_status().paper_jam);

        // Self-test: fresh status + initialize + settle poll.
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        assert!(d.self_test().unwrap());

        d.transport_mut()
            .queue_response(encode_frame("PSA100271", [0, 0x04, 0, 0, 0]));
        assert!(d.request_status().unwrap());
        assert!(d.printer_status().paper_jam);
        assert!(d.printer_status().is_disabling());
    }

    #[test]
    fn test_paper_empty_suppressed_while_printing() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut().queue_response(idle_frame());
        assert!(d.self_test().unwrap());

        // Printing + paper empty: suppressed.
        d.transport_mut()
            .queue_response(encode_frame("PSA100271", [0x03, 0x02, 0, 0, 0]));
        assert!(d.request_status().unwrap());
        assert!(!d.printer_status().paper_empty);

        // Idle + paper empty: reported.
        d.transport_mut()
            .queue_response(encode_frame("PSA100271", [0, 0x02, 0, 0, 0]));
        assert!(d.request_status().unwrap());
        assert!(d.printer_status().paper_empty);
    }

    #[test]
    fn test_form_feed_ejects_current_ticket() {
        let mut d = driver(jcm::profile());
        d.form_feed().unwrap();
        assert_eq!(d.transport_mut().last_sent(), Some(b"^F|".as_slice()));
    }

    #[test]
    fn test_read_crc_widens_and_restores_timeout() {
        let mut d = driver(jcm::profile());
        d.transport_mut()
            .set_read_timeout(Duration::from_millis(500));
        d.transport_mut().queue_response(idle_frame());
        d.transport_mut()
            .queue_response(crc::encode_crc_response(0x1234, crc::CrcByteOrder::LowFirst));

        let value = d.read_crc().unwrap();
        assert_eq!(value, Some(0x1234));
        assert_eq!(d.transport_mut().read_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_reset_clears_caches_and_reallocates_ids() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        let first = d.define_region(&region_def("R1", false)).unwrap();
        d.reset().unwrap();
        assert!(d.transport_mut().did_send(b"^@|"));

        d.transport_mut().queue_response(idle_frame());
        let again = d.define_region(&region_def("R1", false)).unwrap();
        // Allocator restarted: same first id handed out again.
        assert_eq!(first, again);
    }

    #[test]
    fn test_mode_switch_invalidates_caches() {
        let mut d = driver(jcm::profile());
        d.transport_mut().queue_response(idle_frame());
        d.define_region(&region_def("R1", false)).unwrap();
        d.set_use_printer_defined_templates(true);

        // Back to platform mode: region must be recompiled and resent.
        d.set_use_printer_defined_templates(false);
        d.transport_mut().queue_response(idle_frame());
        d.define_region(&region_def("R1", false)).unwrap();
        let region_sends = d
            .transport_mut()
            .sent()
            .iter()
            .filter(|s| s.starts_with(b"^R|"))
            .count();
        assert_eq!(region_sends, 2);
    }
}
