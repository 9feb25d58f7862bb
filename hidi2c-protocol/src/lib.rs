//! HID report protocol of USB-to-I2C bridge controllers
//!
//! The bridge has no bulk endpoint for I2C traffic. Every operation is a
//! numbered HID report:
//!
//! ```text
//! host → bridge   output  0xD0..0xDE  write data  [addr][flag][len][data..]
//! host → bridge   output  0xC2        read req.   [addr][flag][len lo][len hi]
//! bridge → host   input   0xD0..0xDE  read data   [len][data..]
//! host ↔ bridge   feature 0xA1        settings    [cmd][args..] (zero padded)
//! bridge → host   feature 0xC0        bus status  [id][flags][khz lo][khz hi]
//! ```
//!
//! This crate only encodes and decodes those reports. It owns no state and
//! performs no I/O.

#![no_std]
#![deny(unsafe_code)]

// proptest needs std in the test harness
#[cfg(test)]
extern crate std;

pub mod address;
pub mod flag;
pub mod report;
pub mod status;

pub use address::{Address7, SCAN_FIRST, SCAN_LAST};
pub use flag::TransactionFlag;
pub use report::{
    decode_inbound, encode_feature, encode_read_request, encode_write, report_id, settings,
    write_report_id, CodecError, FeatureReport, InboundReport, OutputReport, CLOCK_MAX_KHZ,
    CLOCK_MIN_KHZ, FEATURE_REPORT_SIZES, MAX_PAYLOAD_SIZE,
};
pub use status::{BusFault, BusStatus};
