//! I2C bus scanner
//!
//! Probes every address in a range with a one-byte write and reports the
//! ones whose write went through. The bridge rejects the report when the
//! address is not acknowledged, so a successful write means a device
//! answered. Some devices treat the probe byte as a register pointer; the
//! default 0x00 is harmless for the common ones.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use hidi2c_core::{Error, HidChannel, RangeError, Result, Session};
use hidi2c_protocol::{Address7, TransactionFlag, SCAN_FIRST, SCAN_LAST};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Addresses found by a scan, ascending
pub type ScanResult = Vec<Address7, 128>;

/// Scan parameters
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ScanConfig {
    /// First address probed
    pub first: u8,
    /// Last address probed (inclusive)
    pub last: u8,
    /// Pause before each probe
    pub probe_delay_ms: u32,
    /// Byte written to each address
    pub probe_byte: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            first: SCAN_FIRST,
            last: SCAN_LAST,
            probe_delay_ms: 5,
            probe_byte: 0x00,
        }
    }
}

/// Probe `config.first..=config.last` and collect responding addresses
///
/// The range is checked before anything else: both ends must be 7-bit
/// addresses and `first` must not exceed `last`. Fails with
/// [`Error::NotConnected`] before probing when the session is closed. Stops
/// early if the session closes or another caller holds a read mid-scan.
pub async fn scan_bus<C, M, D>(
    session: &Session<C, M>,
    delay: &mut D,
    config: &ScanConfig,
) -> Result<ScanResult>
where
    C: HidChannel,
    M: RawMutex,
    D: DelayNs,
{
    let first = Address7::new(config.first)?;
    let last = Address7::new(config.last)?;
    if first > last {
        return Err(Error::OutOfRange(RangeError::Address(config.first)));
    }

    if !session.is_connected().await {
        return Err(Error::NotConnected);
    }

    info!("Scanning {:#x}..={:#x}", config.first, config.last);
    let mut found = ScanResult::new();

    for raw in first.raw()..=last.raw() {
        let addr = Address7::new(raw)?;
        delay.delay_ms(config.probe_delay_ms).await;

        match session
            .write(addr, &[config.probe_byte], TransactionFlag::StartStop)
            .await
        {
            Ok(()) => {
                debug!("Device at {:?}", addr);
                // At most 128 7-bit addresses exist
                let _ = found.push(addr);
            }
            Err(e @ (Error::NotConnected | Error::Disconnected | Error::Conflict)) => {
                warn!("Scan aborted at {:?}: {:?}", addr, e);
                return Err(e);
            }
            Err(_) => trace!("No device at {:?}", addr),
        }
    }

    info!("Scan found {} devices", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::join::join;
    use embassy_futures::{block_on, yield_now};
    use embassy_time::Duration;
    use hidi2c_core::mock::{MockBridge, MockChannel, SentReport};
    use hidi2c_core::SessionConfig;
    use std::vec::Vec as StdVec;

    /// Counts requested delays instead of sleeping
    #[derive(Default)]
    struct CountingDelay {
        calls: u32,
        total_ms: u32,
    }

    impl DelayNs for CountingDelay {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.calls += 1;
            self.total_ms += ms;
        }
    }

    fn connect(bridge: &MockBridge) -> Session<MockChannel<'_>> {
        let session = Session::new(SessionConfig::default());
        block_on(session.connect([bridge.channel()])).unwrap();
        bridge.clear_sent();
        session
    }

    #[test]
    fn test_scan_finds_present_devices() {
        let bridge = MockBridge::new();
        bridge.set_present(&[0x48, 0x50]);
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();

        let found = block_on(scan_bus(&session, &mut delay, &ScanConfig::default())).unwrap();

        let raw: StdVec<u8> = found.iter().map(|a| a.raw()).collect();
        assert_eq!(raw, [0x48, 0x50]);
        assert_eq!(delay.calls, 117);
        assert_eq!(delay.total_ms, 117 * 5);
    }

    #[test]
    fn test_scan_ascending_with_stop() {
        let bridge = MockBridge::new();
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();

        let found = block_on(scan_bus(&session, &mut delay, &ScanConfig::default())).unwrap();
        assert_eq!(found.len(), 117);

        let sent = bridge.sent();
        assert_eq!(
            sent.first(),
            Some(&SentReport::Output {
                id: 0xD0,
                data: std::vec![0x03, 0x06, 0x01, 0x00]
            })
        );
        assert_eq!(
            sent.last(),
            Some(&SentReport::Output {
                id: 0xD0,
                data: std::vec![0x77, 0x06, 0x01, 0x00]
            })
        );
    }

    #[test]
    fn test_scan_custom_range() {
        let bridge = MockBridge::new();
        bridge.set_present(&[0x20, 0x48]);
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();
        let config = ScanConfig {
            first: 0x40,
            last: 0x4F,
            probe_delay_ms: 0,
            probe_byte: 0xAA,
        };

        let found = block_on(scan_bus(&session, &mut delay, &config)).unwrap();
        assert_eq!(&found[..], &[Address7::new(0x48).unwrap()]);
        assert_eq!(bridge.sent().len(), 16);
    }

    #[test]
    fn test_scan_rejects_non_7bit_range() {
        let bridge = MockBridge::new();
        // Would be found if the range were only checked while scanning
        bridge.set_present(&[0x70]);
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();
        let config = ScanConfig {
            first: 0x70,
            last: 0x80,
            ..ScanConfig::default()
        };

        assert_eq!(
            block_on(scan_bus(&session, &mut delay, &config)),
            Err(Error::OutOfRange(RangeError::Address(0x80)))
        );
        assert!(bridge.sent().is_empty());
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn test_scan_rejects_inverted_range() {
        let bridge = MockBridge::new();
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();
        let config = ScanConfig {
            first: 0x50,
            last: 0x40,
            ..ScanConfig::default()
        };

        assert_eq!(
            block_on(scan_bus(&session, &mut delay, &config)),
            Err(Error::OutOfRange(RangeError::Address(0x50)))
        );
        assert!(bridge.sent().is_empty());

        // Range errors win over the connection check
        let closed: Session<MockChannel<'_>> = Session::new(SessionConfig::default());
        assert_eq!(
            block_on(scan_bus(&closed, &mut delay, &config)),
            Err(Error::OutOfRange(RangeError::Address(0x50)))
        );
    }

    #[test]
    fn test_scan_single_address() {
        let bridge = MockBridge::new();
        bridge.set_present(&[0x48]);
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();
        let config = ScanConfig {
            first: 0x48,
            last: 0x48,
            ..ScanConfig::default()
        };

        let found = block_on(scan_bus(&session, &mut delay, &config)).unwrap();
        assert_eq!(&found[..], &[Address7::new(0x48).unwrap()]);
        assert_eq!(bridge.sent().len(), 1);
    }

    #[test]
    fn test_scan_aborts_while_read_in_flight() {
        let bridge = MockBridge::new();
        bridge.set_present(&[0x48]);
        let session = connect(&bridge);
        let mut delay = CountingDelay::default();
        let addr = Address7::new(0x48).unwrap();

        let (read, scan) = block_on(join(
            session.read(addr, 1, TransactionFlag::StartStop, Duration::from_millis(1000)),
            async {
                yield_now().await;
                let scan = scan_bus(&session, &mut delay, &ScanConfig::default()).await;
                session.deliver_input_report(0xD0, &[1, 0x5A]);
                scan
            },
        ));

        assert_eq!(scan, Err(Error::Conflict));
        assert_eq!(&read.unwrap()[..], &[0x5A]);
        // Only the read request went out, no scan writes
        assert_eq!(bridge.sent().len(), 1);
    }

    #[test]
    fn test_scan_requires_connection() {
        let session: Session<MockChannel<'_>> = Session::new(SessionConfig::default());
        let mut delay = CountingDelay::default();

        assert_eq!(
            block_on(scan_bus(&session, &mut delay, &ScanConfig::default())),
            Err(Error::NotConnected)
        );
        assert_eq!(delay.calls, 0);
    }
}
