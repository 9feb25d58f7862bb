//! PMBus word reads
//!
//! A PMBus "read word" is an SMBus write of the command code followed by a
//! repeated-start read of two bytes, least significant first. After the
//! transfer the bridge's status report is checked for NACKs.

use embassy_sync::blocking_mutex::raw::RawMutex;
use hidi2c_core::{Error, HidChannel, RangeError, Result, Session};
use hidi2c_protocol::{Address7, BusStatus, TransactionFlag};

/// Common PMBus command codes
pub mod command {
    pub const VOUT_MODE: u8 = 0x20;
    pub const STATUS_WORD: u8 = 0x79;
    pub const READ_VIN: u8 = 0x88;
    pub const READ_VOUT: u8 = 0x8B;
    pub const READ_IOUT: u8 = 0x8C;
    pub const READ_TEMPERATURE_1: u8 = 0x8D;
}

/// Result of a word read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WordReading {
    /// Bytes as received, low byte first
    pub raw: [u8; 2],
    /// Little-endian value of `raw`
    pub value: u16,
    /// Bus status sampled after the read
    pub status: BusStatus,
}

impl WordReading {
    /// The value, or the fault the bus status reports
    pub fn check(&self) -> Result<u16> {
        match self.status.fault() {
            Some(fault) => Err(Error::Bus(fault)),
            None => Ok(self.value),
        }
    }
}

/// Read a 16-bit PMBus register
///
/// A NACK in the bus status does not fail the call; it is logged and left
/// in [`WordReading::status`]. Use [`WordReading::check`] to treat it as an
/// error.
pub async fn read_word<C, M>(
    session: &Session<C, M>,
    addr: Address7,
    command: u8,
) -> Result<WordReading>
where
    C: HidChannel,
    M: RawMutex,
{
    session.write(addr, &[command], TransactionFlag::Start).await?;

    let data = session
        .read(
            addr,
            2,
            TransactionFlag::RepeatedStartStop,
            session.config().read_timeout(),
        )
        .await?;

    // A completed read always holds exactly the requested length
    let raw = match data[..] {
        [lo, hi] => [lo, hi],
        _ => return Err(Error::OutOfRange(RangeError::Length(data.len()))),
    };

    let status = session.read_status().await?;
    if status.is_nack() {
        warn!(
            "PMBus read {:#x} from {:?}: NACK (status {:?})",
            command, addr, status
        );
    }

    let value = u16::from_le_bytes(raw);
    debug!("PMBus {:?} cmd {:#x} = {:#x}", addr, command, value);

    Ok(WordReading { raw, value, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use hidi2c_core::mock::{MockBridge, MockChannel, SentReport};
    use hidi2c_core::SessionConfig;
    use hidi2c_protocol::BusFault;
    use std::vec;

    fn connect(bridge: &MockBridge, config: SessionConfig) -> Session<MockChannel<'_>> {
        let session = Session::new(config);
        block_on(session.connect([bridge.channel()])).unwrap();
        bridge.clear_sent();
        session
    }

    #[test]
    fn test_read_word_end_to_end() {
        let bridge = MockBridge::new();
        let session = connect(&bridge, SessionConfig::default());
        let addr = Address7::new(0x5A).unwrap();
        bridge.queue_read_reply(&[(0xD0, &[0x02, 0x34, 0x12])]);

        let reading =
            block_on(bridge.serve(&session, read_word(&session, addr, command::READ_VOUT)))
                .unwrap();

        assert_eq!(reading.raw, [0x34, 0x12]);
        assert_eq!(reading.value, 0x1234);
        assert!(!reading.status.is_nack());
        assert_eq!(reading.check(), Ok(0x1234));

        assert_eq!(
            bridge.sent(),
            vec![
                SentReport::Output {
                    id: 0xD0,
                    data: vec![0x5A, 0x02, 0x01, 0x8B]
                },
                SentReport::Output {
                    id: 0xC2,
                    data: vec![0x5A, 0x07, 0x02, 0x00]
                },
            ]
        );
    }

    #[test]
    fn test_read_word_nack_is_soft() {
        let bridge = MockBridge::new();
        bridge.set_status(&[0xC0, 0b0000_0110, 0x64, 0x00]);
        let session = connect(&bridge, SessionConfig::default());
        let addr = Address7::new(0x40).unwrap();
        bridge.queue_read_reply(&[(0xD0, &[0x02, 0xFF, 0xFF])]);

        let reading =
            block_on(bridge.serve(&session, read_word(&session, addr, command::READ_VIN)))
                .unwrap();

        assert!(reading.status.addr_nack);
        assert_eq!(reading.value, 0xFFFF);
        assert_eq!(reading.check(), Err(Error::Bus(BusFault::AddressNack)));
    }

    #[test]
    fn test_read_word_timeout() {
        let bridge = MockBridge::new();
        let session = connect(&bridge, SessionConfig::default().with_read_timeout_ms(20));
        let addr = Address7::new(0x5A).unwrap();

        let result = block_on(bridge.serve(&session, read_word(&session, addr, command::READ_IOUT)));
        assert_eq!(result, Err(Error::Timeout));
    }

    #[test]
    fn test_read_word_timeout_from_toml() {
        let bridge = MockBridge::new();
        let config: SessionConfig = toml::from_str("read_timeout_ms = 20").unwrap();
        assert_eq!(&config.feature_report_sizes[..], &[16, 64]);
        let session = connect(&bridge, config);
        let addr = Address7::new(0x5A).unwrap();

        let result = block_on(bridge.serve(&session, read_word(&session, addr, command::READ_IOUT)));
        assert_eq!(result, Err(Error::Timeout));
    }

    #[test]
    fn test_read_word_not_connected() {
        let session: Session<MockChannel<'_>> = Session::new(SessionConfig::default());
        let addr = Address7::new(0x5A).unwrap();

        assert_eq!(
            block_on(read_word(&session, addr, command::STATUS_WORD)),
            Err(Error::NotConnected)
        );
    }
}
