//! Abstraction traits
//!
//! These traits define the interface between the transport session
//! and host-specific HID implementations.

pub mod channel;

pub use channel::HidChannel;
