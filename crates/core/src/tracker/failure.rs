use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::packet::ErrorCode;

/// A failure that ends the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalFailure {
    FinalReject(ErrorCode),
    PeerClosedConnection,
    UnauthenticatedReply,
    LocalFailure,
}

/// Tracks consecutive transient failures and the first terminal one.
pub struct FailureTracker {
    max_transient_failures: u32,
    consecutive_transient: AtomicU32,
    terminal: Mutex<Option<TerminalFailure>>,
}

impl FailureTracker {
    pub fn new(max_transient_failures: u32) -> Self {
        Self {
            max_transient_failures,
            consecutive_transient: AtomicU32::new(0),
            terminal: Mutex::new(None),
        }
    }

    pub fn record_success(&self) {
        self.consecutive_transient.store(0, Ordering::Release);
    }

    /// Returns the number of consecutive transient failures including this one.
    pub fn record_transient(&self) -> u32 {
        self.consecutive_transient.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Only the first terminal failure is kept.
    pub fn record_terminal(&self, failure: TerminalFailure) {
        let mut terminal = self.terminal.lock();
        if terminal.is_none() {
            tracing::debug!(?failure, "terminal failure recorded");
            *terminal = Some(failure);
        }
    }

    pub fn terminal(&self) -> Option<TerminalFailure> {
        *self.terminal.lock()
    }

    pub fn consecutive_transient(&self) -> u32 {
        self.consecutive_transient.load(Ordering::Acquire)
    }

    pub fn transient_limit_reached(&self) -> bool {
        self.consecutive_transient() >= self.max_transient_failures
    }
}
