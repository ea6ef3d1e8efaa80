use clap::{Parser, Subcommand};
use serial_stream_adapter::config::{Config, ConfigLoader, SerialConfig};
use serial_stream_adapter::error::{format_hex, parse_hex, AppError};
use serial_stream_adapter::logging;
use serial_stream_adapter::port::{
    discovery, BlockingStreamAdapter, DataBits, FlowControl, Parity, PortError, StopBits,
    StreamResource, Timeout,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-adapter",
    version,
    about = "Drive a serial line through the blocking stream adapter.",
    long_about = "Opens a serial port, wraps it in the timeout-bounded blocking stream adapter a \
                  synchronous protocol transport would use, and sends raw frames through it. \
                  Useful for checking wiring and timeouts before putting a Modbus master on top."
)]
struct Args {
    /// Configuration file. Defaults to the standard resolution order.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port path, alias or device display name (e.g. "USB-RS485 Cable").
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Data bits per character.
    #[arg(long, global = true, value_enum)]
    data_bits: Option<DataBits>,

    /// Parity checking.
    #[arg(long, global = true, value_enum)]
    parity: Option<Parity>,

    /// Stop bits.
    #[arg(long, global = true, value_enum)]
    stop_bits: Option<StopBits>,

    /// Flow control.
    #[arg(long, global = true, value_enum)]
    flow_control: Option<FlowControl>,

    /// Read timeout in milliseconds, or "infinite".
    #[arg(long, global = true)]
    read_timeout: Option<Timeout>,

    /// Write timeout in milliseconds, or "infinite".
    #[arg(long, global = true)]
    write_timeout: Option<Timeout>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports on this machine.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Send a hex payload and print whatever comes back.
    Exchange {
        /// Bytes to send, e.g. "01 04 00 00 00 02 71 CB".
        payload: String,

        /// Stop after this many reply bytes.
        #[arg(short = 'n', long, default_value_t = 256)]
        expect: usize,

        /// Drop stale input before sending.
        #[arg(long)]
        discard: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    apply_cli_overrides(&mut config, &args);
    config.validate()?;
    logging::init(&config.logging)?;

    match args.command {
        Command::List { json } => list_ports(json),
        Command::Exchange {
            payload,
            expect,
            discard,
        } => exchange(&config, &payload, expect, discard),
    }
}

fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        config.serial.data_bits = bits;
    }
    if let Some(parity) = args.parity {
        config.serial.parity = parity;
    }
    if let Some(bits) = args.stop_bits {
        config.serial.stop_bits = bits;
    }
    if let Some(flow) = args.flow_control {
        config.serial.flow_control = flow;
    }
    if let Some(timeout) = args.read_timeout {
        config.serial.read_timeout = timeout;
    }
    if let Some(timeout) = args.write_timeout {
        config.serial.write_timeout = timeout;
    }
}

fn list_ports(json: bool) -> Result<(), AppError> {
    let ports = discovery::available_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        let ids = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
            _ => "-".to_string(),
        };
        println!("{:<24} {:<10} {:<32}", port.port_name, ids, port.display_name);
    }
    Ok(())
}

/// Alias first, then an enumerated port by path or display name, else the
/// name as given (ptys and similar never show up in enumeration).
fn resolve_port_name(serial: &SerialConfig, requested: &str) -> String {
    let name = serial.resolve_port(requested);
    match discovery::find_by_display_name(&name) {
        Ok(port) => port.port_name,
        Err(PortError::NotFound(_)) => name,
        Err(e) => {
            debug!(error = %e, "port enumeration failed; using name as given");
            name
        }
    }
}

fn exchange(config: &Config, payload: &str, expect: usize, discard: bool) -> Result<(), AppError> {
    let frame = parse_hex(payload)?;
    let requested = config
        .serial
        .port
        .as_deref()
        .ok_or(AppError::NoPortConfigured)?;
    let port_name = resolve_port_name(&config.serial, requested);

    let mut adapter = BlockingStreamAdapter::open(
        &port_name,
        &config.serial.port_configuration(),
        config.adapter.clone(),
    )?;
    adapter.set_read_timeout(config.serial.read_timeout)?;
    adapter.set_write_timeout(config.serial.write_timeout)?;

    if discard {
        adapter.discard_in_buffer()?;
    }
    adapter.write(&frame, 0, frame.len())?;
    info!(port = %port_name, sent = frame.len(), "frame sent");

    let mut reply = Vec::with_capacity(expect);
    let mut chunk = vec![0u8; expect];
    while reply.len() < expect {
        let wanted = expect - reply.len();
        match adapter.read(&mut chunk, 0, wanted) {
            Ok(0) => break,
            Ok(n) => reply.extend_from_slice(&chunk[..n]),
            // Silence after a partial reply marks the end of the frame.
            Err(e) if e.is_timeout() && !reply.is_empty() => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("{}", format_hex(&reply));
    adapter.dispose();
    Ok(())
}
