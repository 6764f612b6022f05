//! Serial port discovery helper for the Squid controller.
//!
//! Lists candidate serial ports and can probe one: a connected Squid
//! controller streams 24-byte status frames continuously, so a probe that
//! sees traffic in multiples of the frame size is almost certainly the
//! right port.

use std::io::Read;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use squid_ctrl::protocol::MESSAGE_LEN;

#[derive(Parser)]
#[command(about = "Discover serial ports for the Squid controller")]
struct Args {
    /// Probe this port for a Squid status stream instead of just listing.
    #[arg(long)]
    probe: Option<String>,

    /// Baud rate used when probing.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.probe {
        Some(port) => probe(&port, args.baud),
        None => list_ports(),
    }
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                println!(
                    "{}  USB {:04x}:{:04x}  {}",
                    port.port_name,
                    usb.vid,
                    usb.pid,
                    usb.product.as_deref().unwrap_or("-"),
                );
            }
            other => println!("{}  {:?}", port.port_name, other),
        }
    }
    Ok(())
}

fn probe(port_name: &str, baud: u32) -> Result<()> {
    info!("probing '{}' at {} baud", port_name, baud);
    let mut port = serialport::new(port_name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .with_context(|| format!("Failed to open '{}'", port_name))?;

    let deadline = Instant::now() + Duration::from_secs(1);
    let mut total = 0usize;
    let mut buf = [0u8; 2 * MESSAGE_LEN];

    while Instant::now() < deadline {
        match port.read(&mut buf) {
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e).context("Probe read failed"),
        }
    }

    if total == 0 {
        println!("{}: silent (no status stream)", port_name);
    } else {
        println!(
            "{}: {} bytes in 1 s ({} full status frames) — looks like a Squid controller",
            port_name,
            total,
            total / MESSAGE_LEN
        );
    }
    Ok(())
}
