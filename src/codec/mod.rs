//! Binary layouts exchanged between nodes and gateways

pub mod framing;
pub mod packet;
pub mod telemetry;

pub use framing::PacketAccumulator;
pub use packet::{Packet, PACKET_SIZE, SYNC_WORD};
pub use telemetry::{TelemetryPayload, TELEMETRY_SIZE};

/// Errors that can occur while decoding a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Input is shorter than the fixed layout
    BufferTooShort { needed: usize, got: usize },
}
