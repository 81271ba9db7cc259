//! Ping/pong liveness tracking for one connection.

use std::time::Duration;
use tokio::time::Instant;

/// Ping cadence and how long a ping may go unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Tracks the single outstanding ping of a connection.
///
/// Each ping carries a fresh sequence number as payload and only a pong
/// echoing that payload clears it. Unsolicited or late pongs are ignored,
/// so they cannot vouch for a later ping.
#[derive(Debug, Default)]
pub struct PingTracker {
    seq: u64,
    outstanding: Option<(u64, Instant)>,
}

impl PingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ping sent at `now` and return its payload.
    ///
    /// An earlier unanswered ping keeps its deadline.
    pub fn ping(&mut self, now: Instant, timeout: Duration) -> Vec<u8> {
        self.seq = self.seq.wrapping_add(1);
        let deadline = match self.outstanding {
            Some((_, deadline)) => deadline,
            None => now + timeout,
        };
        self.outstanding = Some((self.seq, deadline));
        self.seq.to_be_bytes().to_vec()
    }

    /// Handle a pong payload. Returns true if it answered the outstanding ping.
    pub fn pong(&mut self, payload: &[u8]) -> bool {
        match self.outstanding {
            Some((seq, _)) if payload == seq.to_be_bytes().as_slice() => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    /// When the outstanding ping expires, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.outstanding.map(|(_, deadline)| deadline)
    }
}
