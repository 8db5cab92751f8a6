use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::{
    FilterChain, PacketDraft, SendState, StreamPacketFilter, StreamPacketReply,
    StreamPacketRequest,
};
use crate::util::{InstantTimeSrc, TimeSource};

/// Keeps at least `interval` between two dispatches.
pub struct PacingFilter<T: TimeSource = InstantTimeSrc> {
    interval: Duration,
    time_source: T,
    last_sent: Mutex<Option<Instant>>,
}

impl PacingFilter {
    pub fn new(interval: Duration) -> Self {
        Self::with_time_source(interval, InstantTimeSrc::new())
    }
}

impl<T: TimeSource> PacingFilter<T> {
    pub fn with_time_source(interval: Duration, time_source: T) -> Self {
        Self {
            interval,
            time_source,
            last_sent: Mutex::new(None),
        }
    }
}

impl<T: TimeSource> StreamPacketFilter for PacingFilter<T> {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        if self.interval.is_zero() {
            return SendState::Ready;
        }
        match *self.last_sent.lock() {
            Some(last) if self.time_source.now().saturating_duration_since(last) < self.interval => {
                SendState::Wait
            }
            _ => SendState::Ready,
        }
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        *self.last_sent.lock() = Some(self.time_source.now());
        chain.do_filter(request)
    }
}
