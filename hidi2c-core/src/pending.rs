//! Pending-read tracker
//!
//! The bridge answers a read request with one or more input reports that
//! arrive independently of the call that asked for them. The tracker holds
//! the single in-flight read, collects those chunks and decides when the
//! read is over.
//!
//! ```text
//!          arm()                feed() completes
//!   Idle ─────────▶ Armed ───────────────────────▶ Fulfilled ─┐
//!    ▲                │ expire()                               │
//!    │                ├────────────────────────────▶ TimedOut ─┤
//!    │                │ cancel()                               │
//!    │                └────────────────────────────▶ Cancelled ┤
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every resolving call returns `Some(result)` exactly once per arm cycle;
//! whoever gets it owns delivering it to the waiting reader. Calls racing in
//! afterwards see `None`.

use embassy_time::Instant;
use heapless::Vec;
use hidi2c_protocol::MAX_PAYLOAD_SIZE;

use crate::error::{Error, RangeError};

/// Bytes collected for a read
pub type ReadBuffer = Vec<u8, MAX_PAYLOAD_SIZE>;

/// Final outcome of a read
pub type ReadResult = Result<ReadBuffer, Error>;

/// A read waiting for input reports
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRead {
    wanted: usize,
    accumulated: ReadBuffer,
    deadline: Instant,
}

/// Single-slot pending-read state machine
#[derive(Debug, Default)]
pub struct PendingReadTracker {
    slot: Option<PendingRead>,
}

impl PendingReadTracker {
    /// Create an idle tracker
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Start tracking a read of `wanted` bytes due by `deadline`
    pub fn arm(&mut self, wanted: usize, deadline: Instant) -> Result<(), Error> {
        if self.slot.is_some() {
            return Err(Error::Conflict);
        }
        if wanted > MAX_PAYLOAD_SIZE {
            return Err(Error::OutOfRange(RangeError::Length(wanted)));
        }

        self.slot = Some(PendingRead {
            wanted,
            accumulated: Vec::new(),
            deadline,
        });
        Ok(())
    }

    /// Append a chunk from an input report
    ///
    /// Bytes beyond what the read still needs are dropped: the bridge pads
    /// its fixed-size report slots. Ignored while idle.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<ReadResult> {
        let pending = self.slot.as_mut()?;

        let remaining = pending.wanted - pending.accumulated.len();
        let take = remaining.min(chunk.len());
        // `wanted` never exceeds the buffer capacity
        let _ = pending.accumulated.extend_from_slice(&chunk[..take]);

        if pending.accumulated.len() < pending.wanted {
            return None;
        }

        self.slot.take().map(|done| Ok(done.accumulated))
    }

    /// Resolve the armed read with a timeout
    pub fn expire(&mut self) -> Option<ReadResult> {
        self.slot.take().map(|_| Err(Error::Timeout))
    }

    /// Expire the armed read if its deadline is at or before `now`
    pub fn expire_if_due(&mut self, now: Instant) -> Option<ReadResult> {
        match &self.slot {
            Some(pending) if pending.deadline <= now => self.expire(),
            _ => None,
        }
    }

    /// Resolve the armed read with `reason`
    pub fn cancel(&mut self, reason: Error) -> Option<ReadResult> {
        self.slot.take().map(|_| Err(reason))
    }

    /// Whether a read is in flight
    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    /// Deadline of the in-flight read
    pub fn deadline(&self) -> Option<Instant> {
        self.slot.as_ref().map(|pending| pending.deadline)
    }

    /// Bytes received so far for the in-flight read
    pub fn received(&self) -> usize {
        self.slot.as_ref().map_or(0, |pending| pending.accumulated.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_reassembly_across_reports() {
        let mut tracker = PendingReadTracker::new();
        tracker.arm(5, at(100)).unwrap();

        assert_eq!(tracker.feed(&[0xA, 0xB, 0xC]), None);
        assert_eq!(tracker.received(), 3);

        let result = tracker.feed(&[0xD, 0xE]).unwrap().unwrap();
        assert_eq!(&result[..], &[0xA, 0xB, 0xC, 0xD, 0xE]);
        assert!(!tracker.is_armed());
    }

    #[test]
    fn test_over_delivery_truncated() {
        let mut tracker = PendingReadTracker::new();
        tracker.arm(2, at(100)).unwrap();

        let result = tracker.feed(&[0x34, 0x12, 0xFF, 0xFF]).unwrap().unwrap();
        assert_eq!(&result[..], &[0x34, 0x12]);

        tracker.arm(3, at(100)).unwrap();
        assert_eq!(tracker.feed(&[1, 2]), None);
        let result = tracker.feed(&[3, 4, 5]).unwrap().unwrap();
        assert_eq!(&result[..], &[1, 2, 3]);
    }

    #[test]
    fn test_feed_while_idle_ignored() {
        let mut tracker = PendingReadTracker::new();
        assert_eq!(tracker.feed(&[1, 2, 3]), None);
        assert!(!tracker.is_armed());
    }

    #[test]
    fn test_arm_conflict() {
        let mut tracker = PendingReadTracker::new();
        tracker.arm(2, at(100)).unwrap();
        assert_eq!(tracker.arm(2, at(100)), Err(Error::Conflict));
        // The first read is untouched
        assert_eq!(tracker.deadline(), Some(at(100)));
    }

    #[test]
    fn test_rearm_after_resolution() {
        let mut tracker = PendingReadTracker::new();

        tracker.arm(1, at(100)).unwrap();
        assert!(tracker.feed(&[7]).is_some());
        assert!(tracker.arm(1, at(200)).is_ok());

        assert_eq!(tracker.expire(), Some(Err(Error::Timeout)));
        assert!(tracker.arm(1, at(300)).is_ok());
    }

    #[test]
    fn test_arm_rejects_oversized_read() {
        let mut tracker = PendingReadTracker::new();
        assert_eq!(
            tracker.arm(MAX_PAYLOAD_SIZE + 1, at(100)),
            Err(Error::OutOfRange(RangeError::Length(61)))
        );
        assert!(!tracker.is_armed());
    }

    #[test]
    fn test_late_expire_after_fulfillment() {
        let mut tracker = PendingReadTracker::new();
        tracker.arm(2, at(100)).unwrap();

        // Data lands just before the deadline
        assert!(tracker.expire_if_due(at(99)).is_none());
        let fulfilled = tracker.feed(&[1, 2]);
        assert!(matches!(fulfilled, Some(Ok(_))));

        // The deadline timer fires afterwards and must not resolve again
        assert_eq!(tracker.expire_if_due(at(100)), None);
        assert_eq!(tracker.expire(), None);
    }

    #[test]
    fn test_late_feed_after_timeout() {
        let mut tracker = PendingReadTracker::new();
        tracker.arm(2, at(100)).unwrap();

        assert_eq!(tracker.expire_if_due(at(150)), Some(Err(Error::Timeout)));
        assert_eq!(tracker.feed(&[1, 2]), None);
        assert_eq!(tracker.cancel(Error::Disconnected), None);
    }

    #[test]
    fn test_cancel() {
        let mut tracker = PendingReadTracker::new();
        assert_eq!(tracker.cancel(Error::Disconnected), None);

        tracker.arm(4, at(100)).unwrap();
        tracker.feed(&[1]);
        assert_eq!(
            tracker.cancel(Error::Disconnected),
            Some(Err(Error::Disconnected))
        );
        assert_eq!(tracker.received(), 0);
    }
}
