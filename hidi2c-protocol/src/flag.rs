//! I2C framing conditions carried in write and read-request reports

/// Start/stop framing attached to a single bridge transfer
///
/// The numeric codes are defined by the bridge firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransactionFlag {
    /// Continue the current transfer, no start and no stop
    None = 0x00,
    /// START, bus held afterwards
    Start = 0x02,
    /// Repeated START, bus held afterwards
    RepeatedStart = 0x03,
    /// STOP only
    Stop = 0x04,
    /// START ... STOP
    StartStop = 0x06,
    /// Repeated START ... STOP
    RepeatedStartStop = 0x07,
}

impl TransactionFlag {
    /// Wire code of this flag
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Build the flag for one segment of a multi-segment transaction
    ///
    /// `first` marks the opening segment, `direction_changed` a segment
    /// whose direction differs from the previous one, `last` the closing one.
    pub const fn for_segment(first: bool, direction_changed: bool, last: bool) -> Self {
        match (first, direction_changed, last) {
            (true, _, false) => Self::Start,
            (true, _, true) => Self::StartStop,
            (false, true, false) => Self::RepeatedStart,
            (false, true, true) => Self::RepeatedStartStop,
            (false, false, false) => Self::None,
            (false, false, true) => Self::Stop,
        }
    }
}

impl From<TransactionFlag> for u8 {
    fn from(flag: TransactionFlag) -> u8 {
        flag.code()
    }
}
