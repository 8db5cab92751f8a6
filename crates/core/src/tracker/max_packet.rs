use parking_lot::Mutex;

use crate::packet::AmountTooLargeErrorData;

/// What is known about the largest packet the path accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxPacketAmount {
    Unknown,
    /// Guessed from an `F08` without usable metadata.
    Imprecise(u64),
    /// Derived from an `F08` that reported the connector's maximum.
    Precise(u64),
}

impl MaxPacketAmount {
    pub fn value(&self) -> Option<u64> {
        match self {
            MaxPacketAmount::Unknown => None,
            MaxPacketAmount::Imprecise(v) | MaxPacketAmount::Precise(v) => Some(*v),
        }
    }
}

struct Inner {
    max: MaxPacketAmount,
    verified: u64,
}

/// Learns the path's packet ceiling from `F08` rejects.
///
/// Concurrent probes may report different ceilings. The lower one always wins:
/// overestimating capacity causes more rejects, underestimating only costs extra
/// packets.
pub struct MaxPacketAmountTracker {
    inner: Mutex<Inner>,
}

impl Default for MaxPacketAmountTracker {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                max: MaxPacketAmount::Unknown,
                verified: 0,
            }),
        }
    }
}

impl MaxPacketAmountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(&self, sent: u64, data: Option<AmountTooLargeErrorData>) {
        let candidate = match data {
            Some(data) => MaxPacketAmount::Precise(data.max_source_amount(sent)),
            None => MaxPacketAmount::Imprecise(sent.saturating_sub(1)),
        };
        let Some(candidate_value) = candidate.value() else {
            return;
        };

        let mut inner = self.inner.lock();
        let tighter = match inner.max.value() {
            None => true,
            Some(current) => candidate_value < current,
        };
        if tighter {
            tracing::debug!(sent, max = candidate_value, ?candidate, "reduced max packet amount");
            inner.max = candidate;
        }
    }

    /// Records an amount that reached the receiver.
    pub fn record_verified(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.verified = inner.verified.max(amount);
    }

    pub fn max_packet_amount(&self) -> Option<u64> {
        self.inner.lock().max.value()
    }

    pub fn state(&self) -> MaxPacketAmount {
        self.inner.lock().max
    }

    /// Largest amount known to have reached the receiver.
    pub fn verified_packet_amount(&self) -> u64 {
        self.inner.lock().verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_ceiling_wins_regardless_of_order() {
        let tracker = MaxPacketAmountTracker::new();
        tracker.reduce(
            1_000,
            Some(AmountTooLargeErrorData {
                received_amount: 1_000,
                maximum_amount: 300,
            }),
        );
        tracker.reduce(
            10_000,
            Some(AmountTooLargeErrorData {
                received_amount: 10_000,
                maximum_amount: 500,
            }),
        );
        assert_eq!(tracker.state(), MaxPacketAmount::Precise(300));

        tracker.reduce(
            100,
            Some(AmountTooLargeErrorData {
                received_amount: 100,
                maximum_amount: 90,
            }),
        );
        assert_eq!(tracker.max_packet_amount(), Some(90));
    }

    #[test]
    fn missing_metadata_is_imprecise() {
        let tracker = MaxPacketAmountTracker::new();
        tracker.reduce(50, None);
        assert_eq!(tracker.state(), MaxPacketAmount::Imprecise(49));
    }

    #[test]
    fn verified_amount_is_the_maximum_seen() {
        let tracker = MaxPacketAmountTracker::new();
        tracker.record_verified(10);
        tracker.record_verified(5);
        assert_eq!(tracker.verified_packet_amount(), 10);
        assert_eq!(tracker.max_packet_amount(), None);
    }
}
