//! Packet formatting.

use colored::Colorize;
use wsn_node::codec::{Packet, PACKET_SIZE};

/// Battery voltage below which a node is shown as critical
const VBAT_CRITICAL_V: f32 = 3.40;
/// Battery voltage below which a node is shown as low
const VBAT_LOW_V: f32 = 3.60;

/// Plain one-line summary of a packet.
pub fn describe(packet: &Packet) -> String {
    format!(
        "node {:>5}  t={:>10}  line {:>7.2} V {:>6} mA  vbat {:.2} V",
        packet.id,
        packet.timestamp,
        packet.voltage_v(),
        packet.current_ma,
        packet.vbat_v()
    )
}

/// Space-separated hex dump of the wire bytes.
pub fn hex_dump(bytes: &[u8; PACKET_SIZE]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print a packet, colouring the battery by how close it is to cutoff.
pub fn print_packet(packet: &Packet, raw: bool) {
    let line = describe(packet);
    let vbat = packet.vbat_v();

    if vbat < VBAT_CRITICAL_V {
        println!("{}", line.red().bold());
    } else if vbat < VBAT_LOW_V {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }

    if raw {
        println!("    {}", hex_dump(&packet.encode()).dimmed());
    }
}
