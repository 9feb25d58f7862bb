//! `embedded-hal-async` I2C over a bridge session
//!
//! Lets existing sensor and display drivers written against
//! [`embedded_hal_async::i2c::I2c`] run through the bridge. Operations longer
//! than one report are split; start, repeated-start and stop conditions are
//! derived from the position of each piece in the transaction.

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_time::Duration;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};
use hidi2c_core::{Error, HidChannel, Result, Session};
use hidi2c_protocol::{Address7, TransactionFlag, MAX_PAYLOAD_SIZE};

/// Reports needed for an operation of `len` bytes
fn segment_count(len: usize) -> usize {
    len.div_ceil(MAX_PAYLOAD_SIZE).max(1)
}

/// Walks the segments of one transaction handing out their flags
struct Segments {
    total: usize,
    index: usize,
    last_read: Option<bool>,
}

impl Segments {
    fn next(&mut self, read: bool) -> TransactionFlag {
        let first = self.index == 0;
        let changed = self.last_read.is_some_and(|prev| prev != read);
        self.index += 1;
        self.last_read = Some(read);
        TransactionFlag::for_segment(first, changed, self.index == self.total)
    }
}

/// I2C bus handle borrowing a connected [`Session`]
pub struct BridgeI2c<'s, C, M: RawMutex = NoopRawMutex> {
    session: &'s Session<C, M>,
    timeout: Duration,
}

impl<'s, C: HidChannel, M: RawMutex> BridgeI2c<'s, C, M> {
    /// Use the session's configured read timeout
    pub fn new(session: &'s Session<C, M>) -> Self {
        Self {
            session,
            timeout: session.config().read_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, addr: Address7, operations: &mut [Operation<'_>]) -> Result<()> {
        let total: usize = operations
            .iter()
            .map(|op| match op {
                Operation::Read(buf) => segment_count(buf.len()),
                Operation::Write(data) => segment_count(data.len()),
            })
            .sum();
        let mut segments = Segments {
            total,
            index: 0,
            last_read: None,
        };

        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    for n in 0..segment_count(data.len()) {
                        let start = n * MAX_PAYLOAD_SIZE;
                        let end = (start + MAX_PAYLOAD_SIZE).min(data.len());
                        let flag = segments.next(false);
                        self.session.write(addr, &data[start..end], flag).await?;
                    }
                }
                Operation::Read(buf) => {
                    for n in 0..segment_count(buf.len()) {
                        let start = n * MAX_PAYLOAD_SIZE;
                        let end = (start + MAX_PAYLOAD_SIZE).min(buf.len());
                        let chunk = &mut buf[start..end];
                        let flag = segments.next(true);
                        let data = self
                            .session
                            .read(addr, chunk.len(), flag, self.timeout)
                            .await?;
                        let len = data.len().min(chunk.len());
                        chunk[..len].copy_from_slice(&data[..len]);
                    }
                }
            }
        }

        Ok(())
    }
}

impl<C: HidChannel, M: RawMutex> ErrorType for BridgeI2c<'_, C, M> {
    type Error = Error;
}

impl<C: HidChannel, M: RawMutex> I2c for BridgeI2c<'_, C, M> {
    async fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<()> {
        let addr = Address7::new(address)?;
        if operations.is_empty() {
            return Ok(());
        }

        let result = self.run(addr, operations).await;
        match result {
            // The status report tells a NACK apart from other failures
            Ok(()) | Err(Error::Channel(_)) | Err(Error::Timeout) => {
                // Keep the transaction's own error if the status is unreadable
                let status = match self.session.read_status().await {
                    Ok(status) => status,
                    Err(e) => return result.and(Err(e)),
                };
                if let Some(fault) = status.fault() {
                    debug!("Transaction with {:?} failed: {:?}", addr, fault);
                    return Err(Error::Bus(fault));
                }
                result
            }
            Err(e) => Err(e),
        }
    }
}
