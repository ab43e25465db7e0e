pub mod lora;
pub mod traits;
pub mod xbee;

pub use lora::{LoraConfig, LoraRadio, Sx1262Pins};
pub use traits::{RadioError, RadioTransport};
pub use xbee::XBeeRadio;
