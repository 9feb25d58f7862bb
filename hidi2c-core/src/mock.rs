//! In-memory bridge for host tests
//!
//! [`MockBridge`] records every report sent to it and answers read
//! requests with scripted input reports. [`MockBridge::serve`] runs a
//! future against a session while pumping those input reports into
//! [`Session::deliver_input_report`], standing in for the host's HID
//! read loop.

use core::cell::RefCell;
use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use hidi2c_protocol::report::{is_data_report, report_id};
use std::collections::{BTreeSet, VecDeque};
use std::vec::Vec;

use crate::error::ChannelError;
use crate::session::Session;
use crate::traits::HidChannel;

/// Default status: idle, 100 kHz
const IDLE_STATUS: [u8; 4] = [report_id::I2C_STATUS, 0x20, 0x64, 0x00];

/// A report as it reached the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentReport {
    Output { id: u8, data: Vec<u8> },
    Feature { id: u8, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct BridgeState {
    sent: Vec<SentReport>,
    inbox: VecDeque<(u8, Vec<u8>)>,
    read_replies: VecDeque<Vec<(u8, Vec<u8>)>>,
    /// `None` acknowledges every address
    present: Option<BTreeSet<u8>>,
    accepted_feature_len: Option<usize>,
    status: Option<Vec<u8>>,
    fail_status: bool,
    opens: usize,
    closes: usize,
    fail_open: bool,
}

/// Simulated bridge device
#[derive(Debug, Default)]
pub struct MockBridge {
    state: RefCell<BridgeState>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interface exposing the I2C reports
    pub fn channel(&self) -> MockChannel<'_> {
        MockChannel {
            bridge: self,
            i2c: true,
            open: false,
        }
    }

    /// Interface without I2C reports (the bridge's UART side)
    pub fn uart_channel(&self) -> MockChannel<'_> {
        MockChannel {
            bridge: self,
            i2c: false,
            open: false,
        }
    }

    /// Only these addresses acknowledge writes
    pub fn set_present(&self, addrs: &[u8]) {
        self.state.borrow_mut().present = Some(addrs.iter().copied().collect());
    }

    /// Reject feature reports of any other length
    pub fn accept_feature_len(&self, len: usize) {
        self.state.borrow_mut().accepted_feature_len = Some(len);
    }

    pub fn fail_open(&self) {
        self.state.borrow_mut().fail_open = true;
    }

    /// Raw bytes returned for the status report
    pub fn set_status(&self, raw: &[u8]) {
        self.state.borrow_mut().status = Some(raw.to_vec());
    }

    /// Fail every status report query with an I/O error
    pub fn fail_status(&self) {
        self.state.borrow_mut().fail_status = true;
    }

    /// Input reports sent back in answer to the next read request
    pub fn queue_read_reply(&self, reports: &[(u8, &[u8])]) {
        let reply = reports.iter().map(|(id, raw)| (*id, raw.to_vec())).collect();
        self.state.borrow_mut().read_replies.push_back(reply);
    }

    pub fn take_input(&self) -> Option<(u8, Vec<u8>)> {
        self.state.borrow_mut().inbox.pop_front()
    }

    pub fn sent(&self) -> Vec<SentReport> {
        self.state.borrow().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.borrow_mut().sent.clear();
    }

    /// Opened more often than closed
    pub fn is_open(&self) -> bool {
        let state = self.state.borrow();
        state.opens > state.closes
    }

    /// Deliver queued input reports forever
    pub async fn pump<C: HidChannel, M: RawMutex>(&self, session: &Session<C, M>) {
        loop {
            while let Some((id, raw)) = self.take_input() {
                session.deliver_input_report(id, &raw);
            }
            yield_now().await;
        }
    }

    /// Run `fut` to completion while pumping input reports into `session`
    pub async fn serve<C, M, F>(&self, session: &Session<C, M>, fut: F) -> F::Output
    where
        C: HidChannel,
        M: RawMutex,
        F: Future,
    {
        match select(fut, self.pump(session)).await {
            Either::First(output) => output,
            Either::Second(()) => unreachable!(),
        }
    }
}

/// One HID interface of a [`MockBridge`]
#[derive(Debug)]
pub struct MockChannel<'a> {
    bridge: &'a MockBridge,
    i2c: bool,
    open: bool,
}

impl HidChannel for MockChannel<'_> {
    fn supports_output_report(&self, id: u8) -> bool {
        self.i2c && (is_data_report(id) || id == report_id::I2C_READ_REQUEST)
    }

    fn supports_feature_report(&self, id: u8) -> bool {
        self.i2c && (id == report_id::SYSTEM_SETTINGS || id == report_id::I2C_STATUS)
    }

    async fn open(&mut self) -> Result<(), ChannelError> {
        let mut state = self.bridge.state.borrow_mut();
        if state.fail_open {
            return Err(ChannelError::Io);
        }
        state.opens += 1;
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }
        self.bridge.state.borrow_mut().closes += 1;
        self.open = false;
        Ok(())
    }

    async fn send_output_report(&mut self, id: u8, data: &[u8]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }

        let mut state = self.bridge.state.borrow_mut();
        state.sent.push(SentReport::Output {
            id,
            data: data.to_vec(),
        });

        if is_data_report(id) {
            let addr = data.first().copied().unwrap_or_default();
            if let Some(present) = &state.present {
                if !present.contains(&addr) {
                    return Err(ChannelError::Rejected);
                }
            }
        } else if id == report_id::I2C_READ_REQUEST {
            if let Some(reply) = state.read_replies.pop_front() {
                state.inbox.extend(reply);
            }
        }
        Ok(())
    }

    async fn send_feature_report(&mut self, id: u8, data: &[u8]) -> Result<(), ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }

        let mut state = self.bridge.state.borrow_mut();
        state.sent.push(SentReport::Feature {
            id,
            data: data.to_vec(),
        });

        match state.accepted_feature_len {
            Some(len) if len != data.len() => Err(ChannelError::Rejected),
            _ => Ok(()),
        }
    }

    async fn receive_feature_report(&mut self, id: u8, buf: &mut [u8]) -> Result<usize, ChannelError> {
        if !self.open {
            return Err(ChannelError::Closed);
        }
        if id != report_id::I2C_STATUS {
            return Err(ChannelError::Unsupported);
        }

        let state = self.bridge.state.borrow();
        if state.fail_status {
            return Err(ChannelError::Io);
        }
        let raw = state.status.as_deref().unwrap_or(&IDLE_STATUS);
        let len = raw.len().min(buf.len());
        buf[..len].copy_from_slice(&raw[..len]);
        Ok(len)
    }
}
