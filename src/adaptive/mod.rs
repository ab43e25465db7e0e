//! Adaptive transmission-rate control
//!
//! Scales how often the node reports to the charge left in its battery.

pub mod config;
pub mod controller;
pub mod traits;

pub use config::{AdaptiveConfig, AdcConfig, Periods, Thresholds};
pub use controller::{AdaptiveTx, EnergyLevel};
pub use traits::{AdcSource, Clock, NoAdc};
