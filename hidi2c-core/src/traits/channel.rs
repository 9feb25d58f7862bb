//! HID channel abstraction
//!
//! The core never talks to a USB stack directly. A host application wraps
//! its HID device handle (hidapi, WebHID, a usbd-hid host driver, ...) in a
//! type implementing [`HidChannel`] and forwards every input report it
//! receives to [`crate::Session::deliver_input_report`].

use crate::error::ChannelError;

/// One HID interface of a bridge device
///
/// A bridge usually enumerates several interfaces (I2C, UART, GPIO). Only
/// the interface advertising the I2C report ids is used by a session.
#[allow(async_fn_in_trait)]
pub trait HidChannel {
    /// Whether the interface declares output report `id`
    fn supports_output_report(&self, id: u8) -> bool;

    /// Whether the interface declares feature report `id`
    fn supports_feature_report(&self, id: u8) -> bool;

    /// Open the interface
    async fn open(&mut self) -> Result<(), ChannelError>;

    /// Close the interface
    async fn close(&mut self) -> Result<(), ChannelError>;

    /// Send output report `id` with body `data` (id not included)
    async fn send_output_report(&mut self, id: u8, data: &[u8]) -> Result<(), ChannelError>;

    /// Send feature report `id` with body `data` (id not included)
    async fn send_feature_report(&mut self, id: u8, data: &[u8]) -> Result<(), ChannelError>;

    /// Fetch feature report `id` into `buf`
    ///
    /// `buf[0]` receives the report id, like most host HID APIs return it.
    /// Returns the number of bytes written.
    async fn receive_feature_report(&mut self, id: u8, buf: &mut [u8]) -> Result<usize, ChannelError>;
}
