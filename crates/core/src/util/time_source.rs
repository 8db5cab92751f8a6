use std::time::Instant;

#[cfg(test)]
use std::{sync::Arc, time::Duration};

pub trait TimeSource: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// A simple time source that returns the current time using `Instant::now()`.
#[derive(Clone, Copy, Default)]
pub struct InstantTimeSrc(());

impl InstantTimeSrc {
    pub fn new() -> Self {
        InstantTimeSrc(())
    }
}

impl TimeSource for InstantTimeSrc {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock, shared between the code under test and the test itself.
#[cfg(test)]
#[derive(Clone)]
pub struct SharedMockTimeSource {
    current_instant: Arc<parking_lot::Mutex<Instant>>,
}

#[cfg(test)]
impl SharedMockTimeSource {
    pub fn new() -> Self {
        SharedMockTimeSource {
            current_instant: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    pub fn advance_time(&self, duration: Duration) {
        *self.current_instant.lock() += duration;
    }
}

#[cfg(test)]
impl TimeSource for SharedMockTimeSource {
    fn now(&self) -> Instant {
        *self.current_instant.lock()
    }
}
