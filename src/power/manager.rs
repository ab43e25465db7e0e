//! Sensor rail and radio sleep sequencing
//!
//! Drives the radio's SLEEP_RQ line, waits for its ON/SLEEP acknowledgement,
//! switches the sensor load switch and parks the MCU between reports.

use embedded_hal::digital::{InputPin, OutputPin};

use super::handshake::wait_for_level;
use super::sleep::{sleep_plan, DeepSleep, SleepStep, StepDelay};
use super::PowerError;
use crate::config::handshake::ACK_TIMEOUT_MS;

/// Pins owned by the power sequencer
pub struct PowerPins<SleepRq, OnSleep, SensorPower> {
    /// MCU -> radio SLEEP_RQ
    pub sleep_rq: SleepRq,
    /// Radio ON/SLEEP -> MCU
    pub on_sleep: OnSleep,
    /// Sensor rail load switch
    pub sensor_power: SensorPower,
}

/// Power sequencing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerConfig {
    /// Load switch turns the rail on with a low level
    pub invert_power: bool,
    /// Put the radio to sleep during [`EnergyManager::begin`]
    pub boot_sleep: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            invert_power: false,
            boot_sleep: true,
        }
    }
}

/// Sensor and radio power sequencer
pub struct EnergyManager<SleepRq, OnSleep, SensorPower, S> {
    sleep_rq: SleepRq,
    on_sleep: OnSleep,
    sensor_power: SensorPower,
    config: PowerConfig,
    sleeper: S,
}

impl<SleepRq, OnSleep, SensorPower, S> EnergyManager<SleepRq, OnSleep, SensorPower, S>
where
    SleepRq: OutputPin,
    OnSleep: InputPin,
    SensorPower: OutputPin,
    S: DeepSleep,
{
    pub fn new(
        pins: PowerPins<SleepRq, OnSleep, SensorPower>,
        config: PowerConfig,
        sleeper: S,
    ) -> Self {
        Self {
            sleep_rq: pins.sleep_rq,
            on_sleep: pins.on_sleep,
            sensor_power: pins.sensor_power,
            config,
            sleeper,
        }
    }

    /// Switch the sensors off and put the radio in its boot state.
    pub async fn begin(&mut self) -> Result<(), PowerError> {
        self.power_sensors(false)?;

        if self.config.boot_sleep {
            self.sleep_radio(ACK_TIMEOUT_MS).await
        } else {
            self.wake_radio(ACK_TIMEOUT_MS).await
        }
    }

    /// Raise SLEEP_RQ and wait for ON/SLEEP to go high.
    pub async fn wake_radio(&mut self, timeout_ms: u32) -> Result<(), PowerError> {
        self.sleep_rq.set_high().map_err(|_| PowerError::PinError)?;
        self.wait_ack(true, timeout_ms).await
    }

    /// Drop SLEEP_RQ and wait for ON/SLEEP to go low.
    pub async fn sleep_radio(&mut self, timeout_ms: u32) -> Result<(), PowerError> {
        self.sleep_rq.set_low().map_err(|_| PowerError::PinError)?;
        self.wait_ack(false, timeout_ms).await
    }

    /// Switch the sensor rail
    pub fn power_sensors(&mut self, on: bool) -> Result<(), PowerError> {
        let high = on != self.config.invert_power;
        let result = if high {
            self.sensor_power.set_high()
        } else {
            self.sensor_power.set_low()
        };
        result.map_err(|_| PowerError::PinError)
    }

    /// Power down for roughly `ms`, in hardware-sized steps.
    ///
    /// Up to 14 ms of the request may be left unslept.
    pub async fn sleep_for_ms(&mut self, ms: u32) {
        for step in sleep_plan(ms) {
            self.sleeper.power_down(step).await;
        }
    }

    async fn wait_ack(&mut self, high: bool, timeout_ms: u32) -> Result<(), PowerError> {
        let mut delay = StepDelay(&mut self.sleeper);
        let acked = wait_for_level(
            &mut self.on_sleep,
            high,
            timeout_ms,
            SleepStep::SHORTEST.as_ms(),
            &mut delay,
        )
        .await
        .map_err(|_| PowerError::PinError)?;

        if acked {
            Ok(())
        } else {
            log::warn!(
                "power: radio did not acknowledge {} within {} ms",
                if high { "wake" } else { "sleep" },
                timeout_ms
            );
            Err(PowerError::AckTimeout)
        }
    }
}
