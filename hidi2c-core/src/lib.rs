//! HID-to-I2C transport core
//!
//! Platform-independent session logic for USB HID to I2C bridges:
//! - Connection handshake over a host-provided [`HidChannel`]
//! - Write, read and status operations
//! - Reassembly of read data arriving in input reports
//!
//! Host applications supply the HID channel and forward input reports;
//! higher layers (PMBus, bus scanning) live in `hidi2c-drivers`.

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "mock"))]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pending;
pub mod session;
pub mod traits;

pub use config::SessionConfig;
pub use error::{ChannelError, Error, RangeError, Result};
pub use pending::{PendingReadTracker, ReadBuffer, ReadResult};
pub use session::Session;
pub use traits::HidChannel;
