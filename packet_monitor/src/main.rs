//! Packet monitor for sensor node telemetry.
//!
//! Attach to a gateway that forwards received radio frames to a serial port
//! and print every packet found in the byte stream.

mod display;
mod port;

use clap::Parser;
use colored::Colorize;
use wsn_node::codec::PacketAccumulator;

use display::print_packet;
use port::{resolve_port, GatewayPort};

#[derive(Parser)]
#[command(name = "packet-monitor")]
#[command(about = "Decode sensor node packets from a gateway serial port")]
struct Args {
    /// Serial port of the gateway (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Also print each packet's wire bytes
    #[arg(short, long)]
    raw: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Resolve port (auto-detect if "auto")
    let port_name = resolve_port(&args.port)?;

    println!("{}", "Sensor Node Packet Monitor".bold());
    println!("Port: {}", port_name);
    println!("Baud: {}", args.baud);
    println!();

    let mut port = GatewayPort::open(&port_name, args.baud)?;
    port.clear_buffer()?;
    println!("{}", "Listening...".green());

    let mut accumulator = PacketAccumulator::new();
    let mut reported_discards = 0;
    let mut buf = [0u8; 256];

    loop {
        let n = port.read_chunk(&mut buf)?;

        for &byte in &buf[..n] {
            if let Some(packet) = accumulator.push(byte) {
                print_packet(&packet, args.raw);
            }
        }

        let discarded = accumulator.discarded();
        if discarded > reported_discards {
            let skipped = discarded - reported_discards;
            println!(
                "{}",
                format!("  skipped {} bytes while resynchronising", skipped).dimmed()
            );
            reported_discards = discarded;
        }
    }
}
