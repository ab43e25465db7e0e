#![cfg_attr(not(test), no_std)]

pub mod adaptive;
pub mod codec;
pub mod config;
pub mod node;
pub mod power;
pub mod radio;
