//! Packed telemetry record
//!
//! Floating-point variant of the sensor report, used when the link budget
//! allows the larger frame.
//!
//! ```text
//! [unix_time: u32][voltage_ac: f32][current_ac: f32][power_apparent: f32]
//! [battery_voltage: f32][energy_level: u8]
//! ```
//!
//! 21 bytes, packed, host-native byte order.

use super::CodecError;
use crate::adaptive::EnergyLevel;

/// Encoded record length in bytes
pub const TELEMETRY_SIZE: usize = 21;

/// Electrical measurements plus node state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    /// Seconds from the RTC
    pub unix_time: u32,
    /// Line voltage, V
    pub voltage_ac: f32,
    /// Line current, A
    pub current_ac: f32,
    /// Apparent power, VA
    pub power_apparent: f32,
    /// Node battery, V
    pub battery_voltage: f32,
    /// Raw [`EnergyLevel`] code
    pub energy_level: u8,
}

impl TelemetryPayload {
    /// Build a record, deriving apparent power from voltage and current
    pub fn new(
        unix_time: u32,
        voltage_ac: f32,
        current_ac: f32,
        battery_voltage: f32,
        level: EnergyLevel,
    ) -> Self {
        Self {
            unix_time,
            voltage_ac,
            current_ac,
            power_apparent: voltage_ac * current_ac,
            battery_voltage,
            energy_level: level.into(),
        }
    }

    /// Decoded energy level, `None` for an unknown code
    pub fn level(&self) -> Option<EnergyLevel> {
        EnergyLevel::try_from(self.energy_level).ok()
    }

    /// Serialise into the packed layout
    pub fn encode(&self) -> [u8; TELEMETRY_SIZE] {
        let mut buf = [0u8; TELEMETRY_SIZE];
        buf[0..4].copy_from_slice(&self.unix_time.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.voltage_ac.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.current_ac.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.power_apparent.to_ne_bytes());
        buf[16..20].copy_from_slice(&self.battery_voltage.to_ne_bytes());
        buf[20] = self.energy_level;
        buf
    }

    /// Parse the first [`TELEMETRY_SIZE`] bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < TELEMETRY_SIZE {
            return Err(CodecError::BufferTooShort {
                needed: TELEMETRY_SIZE,
                got: buf.len(),
            });
        }

        let word = |at: usize| [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];
        Ok(Self {
            unix_time: u32::from_ne_bytes(word(0)),
            voltage_ac: f32::from_ne_bytes(word(4)),
            current_ac: f32::from_ne_bytes(word(8)),
            power_apparent: f32::from_ne_bytes(word(12)),
            battery_voltage: f32::from_ne_bytes(word(16)),
            energy_level: buf[20],
        })
    }
}
