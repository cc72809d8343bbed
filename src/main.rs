//! # tclprint CLI
//!
//! Operator tooling for TCL ticket printers: poll status, run the
//! self-test, verify the flash CRC, and print test/audit tickets.

use std::path::PathBuf;
use std::thread;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use tclprint::driver::{CancelToken, TclDriver};
use tclprint::pdl::{AuditTicket, RegionDef, TemplateDef, Ticket};
use tclprint::transport::serial::DEFAULT_BAUD;
use tclprint::transport::SerialTransport;
use tclprint::vendor::{jcm, VendorProfile};
use tclprint::TclError;

#[derive(Parser)]
#[command(name = "tclprint", version, about = "TCL/NTL ticket printer tool")]
struct Cli {
    /// Serial device path (e.g. /dev/ttyUSB0)
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Baud rate
    #[arg(short, long, global = true, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the printer and report its status
    Status,
    /// Run the power-up self-test
    SelfTest,
    /// Read and report the device flash CRC (may take up to 40s)
    Crc,
    /// Define regions/templates from a PDL file and print a ticket
    Print {
        /// PDL file with `dpr`/`dpt` lines
        #[arg(long)]
        pdl: PathBuf,
        /// Template id to print (a `dpt` id from the PDL file)
        template: String,
        /// Field data, one value per region in template order
        fields: Vec<String>,
    },
    /// Print a line-mode audit ticket
    Audit {
        /// Centered header line
        #[arg(long, default_value = "AUDIT")]
        header: String,
        /// Left-column lines (repeatable)
        #[arg(long = "left")]
        left: Vec<String>,
        /// Center-column lines (repeatable)
        #[arg(long = "center")]
        center: Vec<String>,
        /// Right-column lines (repeatable)
        #[arg(long = "right")]
        right: Vec<String>,
    },
    /// Eject the current ticket (form feed)
    Eject,
    /// List serial ports available on this system
    ListPorts,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), TclError> {
    match cli.command {
        Command::ListPorts => {
            for port in SerialTransport::list_ports() {
                println!("{port}");
            }
            Ok(())
        }
        command => {
            let mut driver = connect(&cli.device, cli.baud)?;
            dispatch(&mut driver, command)
        }
    }
}

/// Open the port, identify the firmware, and adopt the matching profile.
fn connect(device: &str, baud: u32) -> Result<TclDriver<SerialTransport>, TclError> {
    let transport = SerialTransport::open(device, baud)?;
    let mut driver = TclDriver::new(transport, jcm::profile());

    if !driver.request_status()? {
        return Err(TclError::Transport(format!(
            "no status response from {device}"
        )));
    }
    if let Some(firmware) = driver.firmware() {
        let profile = VendorProfile::for_firmware(firmware);
        info!(firmware, profile = profile.name, "printer identified");
        driver.set_profile(profile);
    }
    Ok(driver)
}

fn dispatch(driver: &mut TclDriver<SerialTransport>, command: Command) -> Result<(), TclError> {
    match command {
        Command::ListPorts => unreachable!("handled before connect"),
        Command::Status => {
            let status = driver.status();
            println!("firmware:        {}", driver.firmware().unwrap_or("?"));
            println!("profile:         {}", driver.profile().name);
            println!("template mode:   {}", status.template_mode());
            println!("top of form:     {}", status.top_of_form());
            println!("busy:            {}", status.busy());
            println!("paper low:       {}", status.paper_low());
            println!("paper empty:     {}", status.paper_empty());
            println!("paper jam:       {}", status.paper_jam());
            println!("head open:       {}", status.print_head_open());
            println!("chassis open:    {}", status.chassis_open());
            println!("system error:    {}", status.system_error());
            Ok(())
        }
        Command::SelfTest => {
            if driver.self_test()? {
                println!("self-test passed");
                Ok(())
            } else {
                Err(TclError::Transport("self-test failed".into()))
            }
        }
        Command::Eject => {
            driver.form_feed()?;
            println!("ticket ejected");
            Ok(())
        }
        Command::Crc => match driver.read_crc()? {
            Some(crc) => {
                println!("{crc:#06x}");
                Ok(())
            }
            None => Err(TclError::Transport("no CRC response".into())),
        },
        Command::Print {
            pdl,
            template,
            fields,
        } => {
            let text = std::fs::read_to_string(&pdl)?;
            load_pdl(driver, &text)?;
            driver.print_ticket(&Ticket::new(template, fields), CancelToken::new())?;
            wait_for_completion(driver)
        }
        Command::Audit {
            header,
            left,
            center,
            right,
        } => {
            driver.print_audit_ticket(
                &AuditTicket {
                    header,
                    left,
                    center,
                    right,
                },
                CancelToken::new(),
            )?;
            wait_for_completion(driver)
        }
    }
}

/// Feed `dpr`/`dpt` lines from a PDL file into the driver.
fn load_pdl(driver: &mut TclDriver<SerialTransport>, text: &str) -> Result<(), TclError> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("dpr ") {
            driver.define_region(&RegionDef::parse(rest)?)?;
        } else if let Some(rest) = line.strip_prefix("dpt ") {
            driver.define_template(&TemplateDef::parse(rest)?)?;
        } else {
            return Err(TclError::PdlParse(format!("unrecognized line: {line:?}")));
        }
    }
    Ok(())
}

fn wait_for_completion(driver: &mut TclDriver<SerialTransport>) -> Result<(), TclError> {
    while driver.is_printing() {
        thread::sleep(driver.poll_interval());
        driver.request_status()?;
    }
    let status = driver.ticket_print_status();
    if status.print_complete {
        println!("print complete");
        Ok(())
    } else {
        Err(TclError::Transport("print did not complete".into()))
    }
}
