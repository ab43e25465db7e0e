//! Battery-aware transmission gate
//!
//! [`AdaptiveTx`] decides, once per control cycle, whether the node may
//! transmit. It classifies the battery into three [`EnergyLevel`]s with a
//! hysteresis dead band around each boundary, suppresses all traffic below a
//! hard cutoff, and spaces transmissions by the period configured for the
//! current level.
//!
//! # Level transitions
//!
//! With `dh = high_v * hysteresis` and `dm = mid_v * hysteresis`:
//!
//! | From | Condition                 | To   |
//! |------|---------------------------|------|
//! | High | `v <  high_v - dh`        | Mid  |
//! | Mid  | `v >= high_v + dh`        | High |
//! | Mid  | `v <  mid_v - dm`         | Low  |
//! | Low  | `v >= mid_v + dm`         | Mid  |
//!
//! At most one transition fires per poll, so the level can never skip Mid.

use super::config::AdaptiveConfig;
use super::traits::{AdcSource, Clock, NoAdc};

/// Discrete energy band governing how often the node reports
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyLevel {
    /// Battery depleted, report rarely
    Low = 0,
    /// Battery nominal
    Mid = 1,
    /// Battery full, report often
    High = 2,
}

impl From<EnergyLevel> for u8 {
    fn from(level: EnergyLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for EnergyLevel {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Mid),
            2 => Ok(Self::High),
            other => Err(other),
        }
    }
}

/// Adaptive duty-cycle controller
///
/// Owns the battery measurement path and the send deadline. The caller polls
/// [`tick`](Self::tick) from its control loop and transmits whenever it
/// returns `true`.
pub struct AdaptiveTx<C, A = NoAdc> {
    config: AdaptiveConfig,
    clock: C,
    adc: Option<A>,
    level: EnergyLevel,
    next_send_ms: u32,
    last_volts: f32,
    cutoff: bool,
    injected: Option<f32>,
}

impl<C: Clock> AdaptiveTx<C, NoAdc> {
    /// Create a controller with no battery channel.
    ///
    /// Voltage must be supplied through [`set_battery_volts`](Self::set_battery_volts).
    pub fn without_adc(config: AdaptiveConfig, clock: C) -> Self {
        Self::new(config, clock, None)
    }
}

impl<C: Clock, A: AdcSource> AdaptiveTx<C, A> {
    /// Create a controller and run [`begin`](Self::begin).
    pub fn new(config: AdaptiveConfig, clock: C, adc: Option<A>) -> Self {
        let mut tx = Self {
            config,
            clock,
            adc,
            level: EnergyLevel::High,
            next_send_ms: 0,
            last_volts: 0.0,
            cutoff: false,
            injected: None,
        };
        tx.begin(config);
        tx
    }

    /// Store `config`, start at [`EnergyLevel::High`] and make the first poll
    /// eligible to transmit.
    pub fn begin(&mut self, config: AdaptiveConfig) {
        self.config = config;
        self.level = EnergyLevel::High;
        self.next_send_ms = self.clock.now_ms();
        log::debug!(
            "adaptive tx: begin, adc {}, first send at {} ms",
            if self.adc.is_some() { "enabled" } else { "disabled" },
            self.next_send_ms
        );
    }

    /// Poll once per control cycle. Returns `true` when it is time to transmit.
    pub fn tick(&mut self) -> bool {
        let volts = match self.injected {
            Some(volts) => volts,
            None => self.read_battery_volts(),
        };
        self.last_volts = volts;

        if volts < self.config.cutoff_v {
            if !self.cutoff {
                log::warn!(
                    "adaptive tx: {} V below cutoff {} V, transmissions suspended",
                    volts,
                    self.config.cutoff_v
                );
            }
            self.cutoff = true;
            return false;
        }
        if self.cutoff {
            log::info!("adaptive tx: {} V, cutoff cleared", volts);
        }
        self.cutoff = false;

        self.update_level(volts);

        let now = self.clock.now_ms();
        if now.wrapping_sub(self.next_send_ms) as i32 >= 0 {
            self.next_send_ms = now.wrapping_add(self.current_period());
            return true;
        }
        false
    }

    /// Measure the battery through the ADC.
    ///
    /// Without a channel this returns the last stored voltage. Otherwise it
    /// averages `samples` conversions and undoes the resistive divider.
    pub fn read_battery_volts(&mut self) -> f32 {
        let Some(adc) = self.adc.as_mut() else {
            return self.last_volts;
        };

        let samples = self.config.adc.effective_samples();
        let mut total: u32 = 0;
        for _ in 0..samples {
            total += u32::from(adc.read_raw());
            adc.settle();
        }

        let average = total as f32 / f32::from(samples);
        self.config.adc.battery_volts(average)
    }

    /// Use `volts` instead of the ADC for every following poll.
    ///
    /// The override is never cleared for the lifetime of this controller.
    pub fn set_battery_volts(&mut self, volts: f32) {
        self.injected = Some(volts);
    }

    /// Current energy level
    pub fn level(&self) -> EnergyLevel {
        self.level
    }

    /// Voltage seen by the most recent poll
    pub fn last_volts(&self) -> f32 {
        self.last_volts
    }

    /// Whether the most recent poll was below the cutoff
    pub fn is_cutoff(&self) -> bool {
        self.cutoff
    }

    /// Reporting period for the current level, milliseconds
    pub fn current_period(&self) -> u32 {
        let periods = &self.config.periods;
        match self.level {
            EnergyLevel::High => periods.high_ms,
            EnergyLevel::Mid => periods.mid_ms,
            EnergyLevel::Low => periods.low_ms,
        }
    }

    /// Tick at which the next transmission becomes due
    pub fn next_send_ms(&self) -> u32 {
        self.next_send_ms
    }

    /// Milliseconds until the next transmission is due, zero if already due
    pub fn ms_until_due(&self) -> u32 {
        let remaining = self.next_send_ms.wrapping_sub(self.clock.now_ms()) as i32;
        remaining.max(0) as u32
    }

    /// Active configuration
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Replace the three reporting periods. The pending deadline is kept.
    pub fn set_periods(&mut self, high_ms: u32, mid_ms: u32, low_ms: u32) {
        self.config.periods.high_ms = high_ms;
        self.config.periods.mid_ms = mid_ms;
        self.config.periods.low_ms = low_ms;
    }

    /// Replace the level boundaries. The current level is not recomputed.
    pub fn set_thresholds(&mut self, high_v: f32, mid_v: f32) {
        self.config.thresholds.high_v = high_v;
        self.config.thresholds.mid_v = mid_v;
    }

    /// Replace the hysteresis fraction
    pub fn set_hysteresis(&mut self, fraction: f32) {
        self.config.thresholds.hysteresis = fraction;
    }

    fn update_level(&mut self, volts: f32) {
        let t = &self.config.thresholds;
        let high_delta = t.high_delta();
        let mid_delta = t.mid_delta();

        let next = match self.level {
            EnergyLevel::High if volts < t.high_v - high_delta => EnergyLevel::Mid,
            EnergyLevel::Mid if volts >= t.high_v + high_delta => EnergyLevel::High,
            EnergyLevel::Mid if volts < t.mid_v - mid_delta => EnergyLevel::Low,
            EnergyLevel::Low if volts >= t.mid_v + mid_delta => EnergyLevel::Mid,
            level => level,
        };

        if next != self.level {
            log::debug!("adaptive tx: {:?} -> {:?} at {} V", self.level, next, volts);
            self.level = next;
        }
    }
}
