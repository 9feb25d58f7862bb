//! Device-level helpers on top of a HID-to-I2C session
//!
//! - PMBus word reads with status reporting
//! - Bus scanning by write probe
//! - `embedded-hal-async` I2C adapter for existing sensor drivers

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod i2c;
pub mod pmbus;
pub mod scan;

pub use i2c::BridgeI2c;
pub use pmbus::{read_word, WordReading};
pub use scan::{scan_bus, ScanConfig, ScanResult};
