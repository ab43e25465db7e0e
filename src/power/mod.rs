//! Power sequencing for the sensor node

pub mod handshake;
pub mod manager;
pub mod sleep;

pub use handshake::wait_for_level;
pub use manager::{EnergyManager, PowerConfig, PowerPins};
pub use sleep::{sleep_plan, DeepSleep, SleepPlan, SleepStep, StepDelay};

/// Errors that can occur while sequencing power
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// Radio did not acknowledge a sleep or wake request in time
    AckTimeout,
    /// GPIO read or write failed
    PinError,
}
