//! Fixed-layout sensor packet
//!
//! # Wire Format
//!
//! ```text
//! [sync: u16][id: u16][voltage: i16][current: i16][vbat: u16][timestamp: u32]
//! ```
//!
//! - `sync`: always [`SYNC_WORD`]
//! - `id`: node identifier
//! - `voltage`: line voltage in centivolts (signed)
//! - `current`: line current in mA (signed)
//! - `vbat`: battery voltage in centivolts
//! - `timestamp`: Unix seconds
//!
//! 14 bytes, no padding, no checksum. Every field is written in the host's
//! native byte order, so sender and receiver must share endianness.

use super::CodecError;

/// Marker at the start of every packet
pub const SYNC_WORD: u16 = 0xABCD;

/// Encoded packet length in bytes
pub const PACKET_SIZE: usize = 14;

/// One sensor report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub sync: u16,
    pub id: u16,
    /// Line voltage, hundredths of a volt
    pub voltage_cv: i16,
    /// Line current, milliamps
    pub current_ma: i16,
    /// Battery voltage, hundredths of a volt
    pub vbat_cv: u16,
    /// Unix seconds
    pub timestamp: u32,
}

impl Packet {
    /// Build a packet from already scaled fields
    pub fn new(id: u16, voltage_cv: i16, current_ma: i16, vbat_cv: u16, timestamp: u32) -> Self {
        Self {
            sync: SYNC_WORD,
            id,
            voltage_cv,
            current_ma,
            vbat_cv,
            timestamp,
        }
    }

    /// Build a packet from readings in volts, rounding to centivolts.
    ///
    /// Out-of-range voltages saturate at the limits of the field.
    pub fn from_measurements(
        id: u16,
        voltage_v: f32,
        current_ma: i16,
        vbat_v: f32,
        timestamp: u32,
    ) -> Self {
        Self::new(
            id,
            libm::roundf(voltage_v * 100.0) as i16,
            current_ma,
            libm::roundf(vbat_v * 100.0) as u16,
            timestamp,
        )
    }

    /// Whether the sync field holds [`SYNC_WORD`]
    pub fn has_sync(&self) -> bool {
        self.sync == SYNC_WORD
    }

    /// Line voltage in volts
    pub fn voltage_v(&self) -> f32 {
        f32::from(self.voltage_cv) / 100.0
    }

    /// Battery voltage in volts
    pub fn vbat_v(&self) -> f32 {
        f32::from(self.vbat_cv) / 100.0
    }

    /// Serialise into the wire layout
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        buf[0..2].copy_from_slice(&self.sync.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.id.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.voltage_cv.to_ne_bytes());
        buf[6..8].copy_from_slice(&self.current_ma.to_ne_bytes());
        buf[8..10].copy_from_slice(&self.vbat_cv.to_ne_bytes());
        buf[10..14].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf
    }

    /// Parse the first [`PACKET_SIZE`] bytes of `buf`.
    ///
    /// The sync word is copied as-is and not checked; see [`has_sync`](Self::has_sync).
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < PACKET_SIZE {
            return Err(CodecError::BufferTooShort {
                needed: PACKET_SIZE,
                got: buf.len(),
            });
        }

        Ok(Self {
            sync: u16::from_ne_bytes([buf[0], buf[1]]),
            id: u16::from_ne_bytes([buf[2], buf[3]]),
            voltage_cv: i16::from_ne_bytes([buf[4], buf[5]]),
            current_ma: i16::from_ne_bytes([buf[6], buf[7]]),
            vbat_cv: u16::from_ne_bytes([buf[8], buf[9]]),
            timestamp: u32::from_ne_bytes([buf[10], buf[11], buf[12], buf[13]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        let packet = Packet::new(0x0102, -5, 300, 372, 1_700_000_000);
        let bytes = packet.encode();

        assert_eq!(&bytes[0..2], &SYNC_WORD.to_ne_bytes());
        assert_eq!(&bytes[2..4], &0x0102u16.to_ne_bytes());
        assert_eq!(&bytes[4..6], &(-5i16).to_ne_bytes());
        assert_eq!(&bytes[6..8], &300i16.to_ne_bytes());
        assert_eq!(&bytes[8..10], &372u16.to_ne_bytes());
        assert_eq!(&bytes[10..14], &1_700_000_000u32.to_ne_bytes());
    }

    #[test]
    fn test_decode_encoded() {
        let packet = Packet::new(7, 23_000, -1_250, 401, 42);
        let decoded = Packet::decode(&packet.encode()).expect("Should decode");
        assert_eq!(decoded, packet);
        assert!(decoded.has_sync());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let packet = Packet::new(3, 1, 2, 3, 4);
        let mut buf = [0xEEu8; 20];
        buf[..PACKET_SIZE].copy_from_slice(&packet.encode());
        assert_eq!(Packet::decode(&buf), Ok(packet));
    }

    #[test]
    fn test_decode_short_buffer() {
        let result = Packet::decode(&[0u8; 13]);
        assert_eq!(
            result,
            Err(CodecError::BufferTooShort {
                needed: PACKET_SIZE,
                got: 13
            })
        );
    }

    #[test]
    fn test_decode_does_not_check_sync() {
        let decoded = Packet::decode(&[0u8; PACKET_SIZE]).expect("Should decode");
        assert!(!decoded.has_sync());
    }

    #[test]
    fn test_from_measurements_rounds_centivolts() {
        let packet = Packet::from_measurements(1, 229.996, 150, 3.857, 0);
        assert_eq!(packet.voltage_cv, 23_000);
        assert_eq!(packet.vbat_cv, 386);
        assert!((packet.vbat_v() - 3.86).abs() < 1e-6);
    }

    #[test]
    fn test_from_measurements_saturates() {
        let packet = Packet::from_measurements(1, 1_000.0, 0, -1.0, 0);
        assert_eq!(packet.voltage_cv, i16::MAX);
        assert_eq!(packet.vbat_cv, 0);
    }
}
