//! Configuration types
//!
//! Plain structures with defaults; deserializable when the `serde`
//! feature is enabled.

pub mod session;

pub use session::*;
