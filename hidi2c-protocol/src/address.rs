//! 7-bit I2C addresses

use crate::report::CodecError;

/// Lowest address probed by a bus scan (0x00-0x02 are reserved)
pub const SCAN_FIRST: u8 = 0x03;

/// Highest address probed by a bus scan (0x78-0x7F are reserved)
pub const SCAN_LAST: u8 = 0x77;

/// A 7-bit I2C device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address7(u8);

impl Address7 {
    /// Create an address, rejecting values above 0x7F
    pub const fn new(addr: u8) -> Result<Self, CodecError> {
        if addr > 0x7F {
            Err(CodecError::AddressOutOfRange(addr))
        } else {
            Ok(Self(addr))
        }
    }

    /// The address as it is placed on the wire
    pub const fn raw(self) -> u8 {
        self.0 & 0x7F
    }
}

impl TryFrom<u8> for Address7 {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address7> for u8 {
    fn from(addr: Address7) -> u8 {
        addr.raw()
    }
}
