//! Transport session
//!
//! Owns the open HID channel and turns the bridge's report surface into
//! I2C primitives: write, read, clock and status. The session is shared by
//! reference between the caller issuing operations and the host code
//! delivering input reports, so all methods take `&self`.
//!
//! At most one read is in flight. [`Session::read`] arms the pending-read
//! tracker, sends the read request and suspends until
//! [`Session::deliver_input_report`] has fed enough bytes, the deadline
//! passes, or the session is torn down.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_deadline, Duration, Instant};
use hidi2c_protocol::report::{self, report_id, MAX_REPORT_SIZE};
use hidi2c_protocol::{
    decode_inbound, encode_read_request, encode_write, Address7, BusStatus, CodecError,
    FeatureReport, InboundReport, TransactionFlag, CLOCK_MAX_KHZ, CLOCK_MIN_KHZ,
};

use crate::config::SessionConfig;
use crate::error::{ChannelError, Error, RangeError, Result};
use crate::pending::{PendingReadTracker, ReadBuffer, ReadResult};
use crate::traits::HidChannel;

/// State touched by both the caller and the input-report path
#[derive(Debug, Default)]
struct Shared {
    tracker: PendingReadTracker,
    listening: bool,
    /// Bumped on every arm, identifies the read a [`ReadGuard`] belongs to
    cycle: u32,
}

impl Shared {
    /// Time out a read whose waiter is gone or has not noticed its deadline
    fn expire_overdue<M: RawMutex>(&mut self, completion: &Signal<M, ReadResult>) {
        if let Some(result) = self.tracker.expire_if_due(Instant::now()) {
            debug!("Read past its deadline, expired");
            completion.signal(result);
        }
    }
}

/// Releases the tracker slot when a `read` future ends, including when it
/// is dropped before the data arrived
struct ReadGuard<'a, M: RawMutex> {
    shared: &'a BlockingMutex<M, RefCell<Shared>>,
    completion: &'a Signal<M, ReadResult>,
    cycle: u32,
}

impl<M: RawMutex> Drop for ReadGuard<'_, M> {
    fn drop(&mut self) {
        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            if shared.cycle != self.cycle {
                return;
            }
            if shared.tracker.cancel(Error::Timeout).is_some() {
                debug!("Read abandoned while in flight");
            }
            self.completion.reset();
        });
    }
}

/// I2C session over one bridge interface
pub struct Session<C, M: RawMutex = NoopRawMutex> {
    config: SessionConfig,
    channel: Mutex<M, Option<C>>,
    shared: BlockingMutex<M, RefCell<Shared>>,
    completion: Signal<M, ReadResult>,
}

/// Whether a channel declares every report the session needs
fn exposes_i2c<C: HidChannel>(channel: &C) -> bool {
    channel.supports_output_report(report_id::I2C_DATA_FIRST)
        && channel.supports_output_report(report_id::I2C_READ_REQUEST)
        && channel.supports_feature_report(report_id::SYSTEM_SETTINGS)
}

impl<C: HidChannel, M: RawMutex> Session<C, M> {
    /// Create a disconnected session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(None),
            shared: BlockingMutex::new(RefCell::new(Shared::default())),
            completion: Signal::new(),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a channel is open
    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Whether a read is waiting for input reports
    ///
    /// A read past its deadline is expired first.
    pub fn read_in_flight(&self) -> bool {
        self.shared.lock(|shared| {
            let mut shared = shared.borrow_mut();
            shared.expire_overdue(&self.completion);
            shared.tracker.is_armed()
        })
    }

    /// Connect to the first candidate exposing the I2C report surface
    ///
    /// Candidates are tried in order. A candidate is opened, starts
    /// listening and must accept the "enable I2C" setting; otherwise it is
    /// closed again and the next one is tried. An existing connection is
    /// dropped first.
    pub async fn connect<I>(&self, candidates: I) -> Result<()>
    where
        I: IntoIterator<Item = C>,
    {
        self.disconnect().await;

        for (index, mut channel) in candidates.into_iter().enumerate() {
            if !exposes_i2c(&channel) {
                debug!("Candidate {}: no I2C reports, skipping", index);
                continue;
            }

            if let Err(e) = channel.open().await {
                warn!("Candidate {}: open failed: {:?}", index, e);
                continue;
            }

            self.set_listening(true);

            match self
                .send_setting(&mut channel, |len| report::set_i2c_mode(true, len))
                .await
            {
                Ok(()) => {
                    *self.channel.lock().await = Some(channel);
                    info!("I2C bridge connected on candidate {}", index);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Candidate {}: enabling I2C failed: {:?}", index, e);
                    self.set_listening(false);
                    if let Err(e) = channel.close().await {
                        debug!("Candidate {}: close failed: {:?}", index, e);
                    }
                }
            }
        }

        Err(Error::NoI2cInterface)
    }

    /// Close the channel
    ///
    /// A read still in flight resolves with [`Error::Disconnected`].
    /// Calling this without a connection does nothing.
    pub async fn disconnect(&self) {
        let channel = self.channel.lock().await.take();

        self.set_listening(false);
        self.resolve(|tracker| tracker.cancel(Error::Disconnected));

        if let Some(mut channel) = channel {
            if let Err(e) = channel.close().await {
                warn!("Close failed: {:?}", e);
            }
            info!("I2C bridge disconnected");
        }
    }

    /// Set the bus clock, 60..=3400 kHz
    pub async fn set_clock(&self, khz: u32) -> Result<()> {
        if khz < CLOCK_MIN_KHZ as u32 || khz > CLOCK_MAX_KHZ as u32 {
            return Err(Error::OutOfRange(RangeError::ClockKhz(khz)));
        }

        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::NotConnected)?;

        self.send_setting(channel, |len| report::set_clock(khz as u16, len))
            .await?;
        info!("I2C clock set to {} kHz", khz);
        Ok(())
    }

    /// Reset the bridge's I2C master (recovers a stuck bus)
    pub async fn reset_bus(&self) -> Result<()> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::NotConnected)?;

        self.send_setting(channel, report::reset_i2c).await?;
        info!("I2C master reset");
        Ok(())
    }

    /// Write up to 60 bytes to `addr`
    pub async fn write(&self, addr: Address7, data: &[u8], flag: TransactionFlag) -> Result<()> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::NotConnected)?;

        let report = encode_write(addr, flag, data)?;
        if self.read_in_flight() {
            return Err(Error::Conflict);
        }

        trace!("Write {} bytes to {:?} ({:?})", data.len(), addr, flag);
        channel.send_output_report(report.id, &report.data).await?;
        Ok(())
    }

    /// Read `length` (at most 60) bytes from `addr`
    ///
    /// Suspends until the bridge delivered the bytes or `timeout` elapsed.
    pub async fn read(
        &self,
        addr: Address7,
        length: usize,
        flag: TransactionFlag,
        timeout: Duration,
    ) -> Result<ReadBuffer> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::NotConnected)?;

        let request = encode_read_request(addr, flag, length)?;

        if length == 0 {
            if self.read_in_flight() {
                return Err(Error::Conflict);
            }
            channel.send_output_report(request.id, &request.data).await?;
            return Ok(ReadBuffer::new());
        }

        let deadline = Instant::now() + timeout;
        let cycle = self.shared.lock(|shared| -> Result<u32> {
            let mut shared = shared.borrow_mut();
            shared.expire_overdue(&self.completion);
            // The previous reader has not collected its outcome yet
            if self.completion.signaled() {
                return Err(Error::Conflict);
            }
            shared.tracker.arm(length, deadline)?;
            shared.cycle = shared.cycle.wrapping_add(1);
            Ok(shared.cycle)
        })?;
        let _armed = ReadGuard {
            shared: &self.shared,
            completion: &self.completion,
            cycle,
        };

        trace!("Read {} bytes from {:?} ({:?})", length, addr, flag);
        channel.send_output_report(request.id, &request.data).await?;
        // Input reports and disconnect must get through while we wait
        drop(guard);

        match with_deadline(deadline, self.completion.wait()).await {
            Ok(result) => result,
            Err(_) => {
                self.resolve(PendingReadTracker::expire);
                let result = self.completion.try_take().unwrap_or(Err(Error::Timeout));
                if result == Err(Error::Timeout) {
                    debug!("Read from {:?} timed out", addr);
                }
                result
            }
        }
    }

    /// Query and decode the bus status report
    pub async fn read_status(&self) -> Result<BusStatus> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = [0u8; MAX_REPORT_SIZE];
        let len = channel
            .receive_feature_report(report_id::I2C_STATUS, &mut buf)
            .await?;

        let status = BusStatus::decode(&buf[..len.min(buf.len())]);
        trace!("Bus status: {:?}", status);
        Ok(status)
    }

    /// Input-report listener
    ///
    /// Host code calls this for every input report read from the device.
    /// Data reports feed the in-flight read; anything else is ignored.
    pub fn deliver_input_report(&self, id: u8, raw: &[u8]) {
        match decode_inbound(id, raw) {
            InboundReport::Data { chunk, .. } => {
                self.shared.lock(|shared| {
                    let mut shared = shared.borrow_mut();
                    if !shared.listening {
                        return;
                    }
                    if !shared.tracker.is_armed() {
                        debug!("Unsolicited data report {:#x}, dropped", id);
                        return;
                    }
                    if let Some(result) = shared.tracker.feed(chunk) {
                        self.completion.signal(result);
                    }
                });
            }
            InboundReport::Other { id, raw } => {
                trace!("Ignoring input report {:#x} ({} bytes)", id, raw.len());
            }
        }
    }

    /// Send a system setting, trying each configured padded size in turn
    async fn send_setting<F>(&self, channel: &mut C, build: F) -> Result<()>
    where
        F: Fn(usize) -> core::result::Result<FeatureReport, CodecError>,
    {
        let mut last_error = Error::Channel(ChannelError::Unsupported);

        for &size in self.config.feature_report_sizes.iter() {
            let report = match build(size as usize) {
                Ok(report) => report,
                Err(e) => {
                    last_error = e.into();
                    continue;
                }
            };

            match channel
                .send_feature_report(report_id::SYSTEM_SETTINGS, &report)
                .await
            {
                Ok(()) => {
                    trace!("System setting accepted as {} byte report", size);
                    return Ok(());
                }
                Err(e) => {
                    debug!("System setting rejected as {} byte report: {:?}", size, e);
                    last_error = Error::Channel(e);
                }
            }
        }

        Err(last_error)
    }

    fn set_listening(&self, listening: bool) {
        self.shared
            .lock(|shared| shared.borrow_mut().listening = listening);
    }

    /// Run a tracker transition and hand its result, if any, to the reader
    fn resolve(&self, transition: impl FnOnce(&mut PendingReadTracker) -> Option<ReadResult>) {
        self.shared.lock(|shared| {
            if let Some(result) = transition(&mut shared.borrow_mut().tracker) {
                self.completion.signal(result);
            }
        });
    }
}
