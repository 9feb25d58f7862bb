//! Error types
//!
//! Every fallible operation of the crate returns [`Error`]. Channel
//! implementations map their transport failures onto [`ChannelError`].

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use hidi2c_protocol::{BusFault, CodecError};

/// Result type for bridge operations
pub type Result<T> = core::result::Result<T, Error>;

/// Bridge operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Operation needs an open session
    NotConnected,
    /// No candidate channel exposes the I2C report surface
    NoI2cInterface,
    /// Address, length or clock outside protocol bounds
    OutOfRange(RangeError),
    /// A read is already in flight
    Conflict,
    /// Not enough input reports arrived before the deadline
    Timeout,
    /// Bus status reported a fault
    Bus(BusFault),
    /// Session closed while a read was in flight
    Disconnected,
    /// The underlying channel failed
    Channel(ChannelError),
}

/// Which bound was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeError {
    /// Address above 0x7F
    Address(u8),
    /// Payload or read length above one report
    Length(usize),
    /// Clock outside the supported range
    ClockKhz(u32),
    /// Feature report size the bridge cannot use
    ReportSize(usize),
}

/// Transport-level failures reported by a [`crate::HidChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Device is closed or was unplugged
    Closed,
    /// Report transfer failed
    Io,
    /// Device refused the report (wrong size, stalled, NACK surfaced by firmware)
    Rejected,
    /// Report id not supported by this interface
    Unsupported,
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::AddressOutOfRange(addr) => Error::OutOfRange(RangeError::Address(addr)),
            CodecError::PayloadTooLarge(len) => Error::OutOfRange(RangeError::Length(len)),
            CodecError::InvalidReportSize(len) => Error::OutOfRange(RangeError::ReportSize(len)),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Error::Channel(e)
    }
}

impl From<BusFault> for Error {
    fn from(fault: BusFault) -> Self {
        Error::Bus(fault)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected => write!(f, "not connected"),
            Error::NoI2cInterface => write!(f, "no HID interface with I2C reports found"),
            Error::OutOfRange(e) => write!(f, "out of range: {}", e),
            Error::Conflict => write!(f, "a read is already in progress"),
            Error::Timeout => write!(f, "read timed out"),
            Error::Bus(fault) => write!(f, "I2C bus error: {:?}", fault),
            Error::Disconnected => write!(f, "disconnected during read"),
            Error::Channel(e) => write!(f, "HID channel error: {:?}", e),
        }
    }
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::Address(addr) => write!(f, "address {:#04x} exceeds 7 bits", addr),
            RangeError::Length(len) => write!(f, "length {} exceeds one report", len),
            RangeError::ClockKhz(khz) => write!(f, "clock {} kHz unsupported", khz),
            RangeError::ReportSize(len) => write!(f, "feature report size {} unusable", len),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Bus(BusFault::AddressNack) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Error::Bus(BusFault::DataNack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::Bus(BusFault::ArbitrationLost) => ErrorKind::ArbitrationLoss,
            Error::Bus(BusFault::Bus) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}
