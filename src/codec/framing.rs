//! Packet accumulator for raw byte streams
//!
//! Gateways forward packets as a bare byte stream with no delimiter. The
//! accumulator hunts for the sync word and then collects a full packet.

use super::packet::{Packet, PACKET_SIZE, SYNC_WORD};
use heapless::Vec;

/// Accumulates incoming bytes and extracts complete packets.
///
/// Bytes before a sync word are discarded. Once the two sync bytes are seen
/// the next twelve bytes are taken unconditionally, since the format has no
/// checksum to reject a false sync inside a payload.
pub struct PacketAccumulator {
    buffer: Vec<u8, PACKET_SIZE>,
    discarded: usize,
}

impl PacketAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarded: 0,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(packet)` when the last byte of a packet arrives.
    pub fn push(&mut self, byte: u8) -> Option<Packet> {
        let sync = SYNC_WORD.to_ne_bytes();

        match self.buffer.len() {
            0 => {
                if byte == sync[0] {
                    let _ = self.buffer.push(byte);
                } else {
                    self.discarded += 1;
                }
                None
            }
            1 => {
                if byte == sync[1] {
                    let _ = self.buffer.push(byte);
                } else {
                    // The first byte was noise, but this one may start a sync
                    self.buffer.clear();
                    self.discarded += 1;
                    return self.push(byte);
                }
                None
            }
            _ => {
                let _ = self.buffer.push(byte);
                if !self.buffer.is_full() {
                    return None;
                }

                let packet = Packet::decode(&self.buffer).ok();
                self.buffer.clear();
                packet
            }
        }
    }

    /// Reset the accumulator, discarding any partial packet.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns true if no partial packet is in progress.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of bytes dropped while hunting for a sync word.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Default for PacketAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
