//! I2C bus status report decoding
//!
//! The status feature report (0xC0) layout:
//! - byte 0: report id
//! - byte 1: controller status flags
//! - bytes 2-3: current bus clock in kHz (little-endian)

/// Status flag bits (byte 1)
pub mod flags {
    /// Controller busy with a transfer
    pub const BUSY: u8 = 1 << 0;
    /// Last transfer ended with an error
    pub const ERROR: u8 = 1 << 1;
    /// Slave address not acknowledged
    pub const ADDRESS_NACK: u8 = 1 << 2;
    /// Data byte not acknowledged
    pub const DATA_NACK: u8 = 1 << 3;
    /// Arbitration lost
    pub const ARBITRATION_LOST: u8 = 1 << 4;
    /// Controller idle
    pub const IDLE: u8 = 1 << 5;
    /// Bus held by another master
    pub const BUS_BUSY: u8 = 1 << 6;
}

/// Decoded bus status
///
/// Always decoded fresh from a status report, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus {
    /// Controller busy
    pub busy: bool,
    /// Error on last transfer
    pub error: bool,
    /// Address NACK
    pub addr_nack: bool,
    /// Data NACK
    pub data_nack: bool,
    /// Arbitration lost
    pub arb_lost: bool,
    /// Controller idle
    pub idle: bool,
    /// Bus busy
    pub bus_busy: bool,
    /// Current clock in kHz
    pub speed_khz: u16,
}

/// Most significant fault reported by a status block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// No device acknowledged the address
    AddressNack,
    /// The device refused a data byte
    DataNack,
    /// Another master won arbitration
    ArbitrationLost,
    /// Unspecified controller error
    Bus,
}

impl BusStatus {
    /// Decode a raw status report
    ///
    /// Missing bytes decode as zero, so this never fails.
    pub fn decode(raw: &[u8]) -> Self {
        let byte = |i: usize| raw.get(i).copied().unwrap_or(0);
        let status = byte(1);

        Self {
            busy: status & flags::BUSY != 0,
            error: status & flags::ERROR != 0,
            addr_nack: status & flags::ADDRESS_NACK != 0,
            data_nack: status & flags::DATA_NACK != 0,
            arb_lost: status & flags::ARBITRATION_LOST != 0,
            idle: status & flags::IDLE != 0,
            bus_busy: status & flags::BUS_BUSY != 0,
            speed_khz: u16::from_le_bytes([byte(2), byte(3)]),
        }
    }

    /// Either kind of NACK
    pub fn is_nack(&self) -> bool {
        self.addr_nack || self.data_nack
    }

    /// The fault to report for this status, if any
    pub fn fault(&self) -> Option<BusFault> {
        if self.addr_nack {
            Some(BusFault::AddressNack)
        } else if self.data_nack {
            Some(BusFault::DataNack)
        } else if self.arb_lost {
            Some(BusFault::ArbitrationLost)
        } else if self.error {
            Some(BusFault::Bus)
        } else {
            None
        }
    }
}
