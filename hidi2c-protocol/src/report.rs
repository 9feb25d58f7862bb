//! Report encoding and decoding
//!
//! Outbound:
//! - write data (output 0xD0..0xDE): `[addr][flag][len][data..]`, the report
//!   id grows by one per 4 payload bytes
//! - read request (output 0xC2): `[addr][flag][len lo][len hi]`
//! - system settings (feature 0xA1): `[cmd][args..]` zero padded to a fixed size
//!
//! Inbound:
//! - read data (input 0xD0..0xDE): `[len][data..]`

use heapless::Vec;

use crate::address::Address7;
use crate::flag::TransactionFlag;

/// Report identifiers of the bridge report surface
pub mod report_id {
    /// System settings (feature, carries a sub-command)
    pub const SYSTEM_SETTINGS: u8 = 0xA1;
    /// I2C bus status (feature)
    pub const I2C_STATUS: u8 = 0xC0;
    /// I2C read request (output)
    pub const I2C_READ_REQUEST: u8 = 0xC2;
    /// First write/read data report
    pub const I2C_DATA_FIRST: u8 = 0xD0;
    /// Last write/read data report (60 byte slot)
    pub const I2C_DATA_LAST: u8 = 0xDE;
}

/// Sub-commands of the system settings report
pub mod settings {
    /// Enable or disable the I2C function (arg: 1 = enable)
    pub const SET_I2C_MODE: u8 = 0x02;
    /// Reset the I2C master
    pub const I2C_RESET: u8 = 0x20;
    /// Set the I2C clock (arg: little-endian kHz)
    pub const SET_I2C_CLOCK: u8 = 0x22;
}

/// Largest payload one write or read report can carry
pub const MAX_PAYLOAD_SIZE: usize = 60;

/// Largest report body (write header + payload fits in this)
pub const MAX_REPORT_SIZE: usize = 64;

/// Padded feature report sizes accepted by the bridge, tried in order
pub const FEATURE_REPORT_SIZES: [u8; 2] = [16, 64];

/// Lowest supported I2C clock in kHz
pub const CLOCK_MIN_KHZ: u16 = 60;

/// Highest supported I2C clock in kHz
pub const CLOCK_MAX_KHZ: u16 = 3400;

/// Write header: address, flag, length
const WRITE_HEADER_LEN: usize = 3;

/// Errors produced while building reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Address does not fit in 7 bits
    AddressOutOfRange(u8),
    /// Payload (or requested read length) exceeds one report
    PayloadTooLarge(usize),
    /// Feature report size cannot hold the command or exceeds a report
    InvalidReportSize(usize),
}

/// An outbound output report
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputReport {
    /// Report identifier
    pub id: u8,
    /// Report body (without the identifier)
    pub data: Vec<u8, MAX_REPORT_SIZE>,
}

/// A padded feature report body
pub type FeatureReport = Vec<u8, MAX_REPORT_SIZE>;

/// Classified inbound report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundReport<'a> {
    /// I2C read data
    Data {
        /// Report identifier
        id: u8,
        /// Payload bytes after the length prefix
        chunk: &'a [u8],
    },
    /// Any other report, passed through untouched
    Other {
        /// Report identifier
        id: u8,
        /// Raw report body
        raw: &'a [u8],
    },
}

/// Report id used for a write payload of `len` bytes
///
/// The bridge has one report slot per 4 payload bytes starting at 0xD0.
pub const fn write_report_id(len: usize) -> u8 {
    report_id::I2C_DATA_FIRST + (len.saturating_sub(1) / 4) as u8
}

/// Whether `id` is one of the data report slots
pub const fn is_data_report(id: u8) -> bool {
    id >= report_id::I2C_DATA_FIRST && id <= report_id::I2C_DATA_LAST
}

/// Encode an I2C write of `data` to `addr`
pub fn encode_write(
    addr: Address7,
    flag: TransactionFlag,
    data: &[u8],
) -> Result<OutputReport, CodecError> {
    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(data.len()));
    }

    let mut body = Vec::new();
    body.extend_from_slice(&[addr.raw(), flag.code(), data.len() as u8])
        .map_err(|_| CodecError::PayloadTooLarge(data.len()))?;
    body.extend_from_slice(data)
        .map_err(|_| CodecError::PayloadTooLarge(data.len()))?;

    Ok(OutputReport {
        id: write_report_id(data.len()),
        data: body,
    })
}

/// Encode a request to read `length` bytes from `addr`
///
/// The data arrives later as one or more input reports.
pub fn encode_read_request(
    addr: Address7,
    flag: TransactionFlag,
    length: usize,
) -> Result<OutputReport, CodecError> {
    if length > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(length));
    }

    let length = length as u16;
    let mut body = Vec::new();
    body.extend_from_slice(&[
        addr.raw(),
        flag.code(),
        (length & 0xFF) as u8,
        (length >> 8) as u8,
    ])
    .map_err(|_| CodecError::PayloadTooLarge(length as usize))?;

    Ok(OutputReport {
        id: report_id::I2C_READ_REQUEST,
        data: body,
    })
}

/// Classify an inbound report and strip the length prefix of data reports
///
/// A prefix larger than what the report carries is clamped to the bytes
/// actually present.
pub fn decode_inbound(id: u8, raw: &[u8]) -> InboundReport<'_> {
    if !is_data_report(id) {
        return InboundReport::Other { id, raw };
    }

    let chunk = match raw.split_first() {
        Some((&prefix, rest)) => &rest[..(prefix as usize).min(rest.len())],
        None => &[],
    };

    InboundReport::Data { id, chunk }
}

/// Encode a system-settings feature report padded to `padded_len` bytes
pub fn encode_feature(code: u8, args: &[u8], padded_len: usize) -> Result<FeatureReport, CodecError> {
    if padded_len < 1 + args.len() || padded_len > MAX_REPORT_SIZE {
        return Err(CodecError::InvalidReportSize(padded_len));
    }

    let mut report = Vec::new();
    report
        .push(code)
        .map_err(|_| CodecError::InvalidReportSize(padded_len))?;
    report
        .extend_from_slice(args)
        .map_err(|_| CodecError::InvalidReportSize(padded_len))?;
    report
        .resize(padded_len, 0)
        .map_err(|_| CodecError::InvalidReportSize(padded_len))?;

    Ok(report)
}

/// Enable or disable the bridge's I2C function
pub fn set_i2c_mode(enable: bool, padded_len: usize) -> Result<FeatureReport, CodecError> {
    encode_feature(settings::SET_I2C_MODE, &[enable as u8], padded_len)
}

/// Set the I2C clock in kHz
///
/// Range checking is left to the caller.
pub fn set_clock(khz: u16, padded_len: usize) -> Result<FeatureReport, CodecError> {
    encode_feature(settings::SET_I2C_CLOCK, &khz.to_le_bytes(), padded_len)
}

/// Reset the bridge's I2C master
pub fn reset_i2c(padded_len: usize) -> Result<FeatureReport, CodecError> {
    encode_feature(settings::I2C_RESET, &[], padded_len)
}
