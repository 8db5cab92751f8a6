use parking_lot::Mutex;

/// Amounts and packet counts of one payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmountSnapshot {
    pub sent: u64,
    pub delivered: u64,
    pub in_flight: u64,
    pub fulfilled_packets: u64,
    pub rejected_packets: u64,
    pub errored_packets: u64,
}

pub struct AmountTracker {
    target: u64,
    inner: Mutex<AmountSnapshot>,
}

impl AmountTracker {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            inner: Mutex::new(AmountSnapshot::default()),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Source amount neither delivered nor in flight.
    pub fn remaining_to_send(&self) -> u64 {
        let inner = self.inner.lock();
        self.target
            .saturating_sub(inner.sent)
            .saturating_sub(inner.in_flight)
    }

    pub fn prepare(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_add(amount);
    }

    pub fn fulfill(&self, amount: u64, delivered: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);
        inner.sent = inner.sent.saturating_add(amount);
        inner.delivered = inner.delivered.saturating_add(delivered);
        inner.fulfilled_packets += 1;
    }

    pub fn reject(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);
        inner.rejected_packets += 1;
    }

    pub fn error(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);
        inner.errored_packets += 1;
    }

    pub fn snapshot(&self) -> AmountSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_excludes_sent_and_in_flight() {
        let tracker = AmountTracker::new(1000);
        tracker.prepare(300);
        assert_eq!(tracker.remaining_to_send(), 700);
        tracker.fulfill(300, 600);
        tracker.prepare(200);
        tracker.reject(200);
        tracker.prepare(100);
        tracker.error(100);
        assert_eq!(tracker.remaining_to_send(), 700);
        assert_eq!(
            tracker.snapshot(),
            AmountSnapshot {
                sent: 300,
                delivered: 600,
                in_flight: 0,
                fulfilled_packets: 1,
                rejected_packets: 1,
                errored_packets: 1,
            }
        );
    }
}
