//! Tunables for the adaptive transmission controller
//!
//! Defaults come from [`crate::config`]. None of the values are validated:
//! the divider's lower resistance and the ADC full scale must be non-zero,
//! and `mid_v` is expected to sit below `high_v`.

use crate::config::{battery, periods, thresholds};

/// Battery measurement front end
///
/// The battery is wired through a resistive divider
/// `Vbat -> upper -> (ADC tap) -> lower -> GND`, so the ADC only sees
/// `lower / (upper + lower)` of the real voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcConfig {
    /// ADC reference voltage in volts
    pub reference_v: f32,
    /// Code reported at full scale (1023.0 for 10-bit, 4095.0 for 12-bit)
    pub full_scale: f32,
    /// Divider resistor above the tap, kOhm
    pub divider_upper_kohm: f32,
    /// Divider resistor below the tap, kOhm
    pub divider_lower_kohm: f32,
    /// Conversions averaged per reading. Zero is treated as one.
    pub samples: u8,
}

impl AdcConfig {
    /// Multiplier that recovers the battery voltage from the tap voltage
    pub fn divider_factor(&self) -> f32 {
        (self.divider_upper_kohm + self.divider_lower_kohm) / self.divider_lower_kohm
    }

    /// Convert an averaged raw code into battery volts
    pub fn battery_volts(&self, average_code: f32) -> f32 {
        let adc_v = (average_code / self.full_scale) * self.reference_v;
        adc_v * self.divider_factor()
    }

    /// Sample count actually used per reading
    pub fn effective_samples(&self) -> u8 {
        self.samples.max(1)
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            reference_v: battery::ADC_REFERENCE_V,
            full_scale: battery::ADC_FULL_SCALE,
            divider_upper_kohm: battery::DIVIDER_UPPER_KOHM,
            divider_lower_kohm: battery::DIVIDER_LOWER_KOHM,
            samples: battery::AVERAGING_SAMPLES,
        }
    }
}

/// Band edges between the three energy levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Boundary between MID and HIGH, volts
    pub high_v: f32,
    /// Boundary between LOW and MID, volts
    pub mid_v: f32,
    /// Dead band on each side of a boundary, as a fraction of that boundary
    pub hysteresis: f32,
}

impl Thresholds {
    /// Half-width of the dead band around `high_v`
    pub fn high_delta(&self) -> f32 {
        self.high_v * self.hysteresis
    }

    /// Half-width of the dead band around `mid_v`
    pub fn mid_delta(&self) -> f32 {
        self.mid_v * self.hysteresis
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_v: thresholds::HIGH_V,
            mid_v: thresholds::MID_V,
            hysteresis: thresholds::HYSTERESIS,
        }
    }
}

/// Reporting period for each energy level, milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub high_ms: u32,
    pub mid_ms: u32,
    pub low_ms: u32,
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            high_ms: periods::HIGH_MS,
            mid_ms: periods::MID_MS,
            low_ms: periods::LOW_MS,
        }
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    pub adc: AdcConfig,
    pub thresholds: Thresholds,
    /// Hard floor, volts. Nothing is transmitted below it.
    pub cutoff_v: f32,
    pub periods: Periods,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            adc: AdcConfig::default(),
            thresholds: Thresholds::default(),
            cutoff_v: thresholds::CUTOFF_V,
            periods: Periods::default(),
        }
    }
}

impl AdaptiveConfig {
    /// Replace the thresholds
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Replace the cutoff voltage
    pub fn with_cutoff(mut self, cutoff_v: f32) -> Self {
        self.cutoff_v = cutoff_v;
        self
    }

    /// Replace the reporting periods
    pub fn with_periods(mut self, periods: Periods) -> Self {
        self.periods = periods;
        self
    }

    /// Replace the ADC front end description
    pub fn with_adc(mut self, adc: AdcConfig) -> Self {
        self.adc = adc;
        self
    }
}
