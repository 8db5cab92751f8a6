//! Additive-increase / multiplicative-decrease controller.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{CongestionControl, CongestionControlStats};
use crate::packet::{ErrorCode, RejectPacket};

/// Configuration for the AIMD controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimdConfig {
    /// Window before any feedback (source units).
    pub initial_window: u64,
    /// Window growth per fulfilled packet once out of slow start.
    pub increase_amount: u64,
    /// Divisor applied to the window on a capacity reject.
    pub decrease_factor: u64,
}

impl Default for AimdConfig {
    fn default() -> Self {
        Self {
            initial_window: 1000,
            increase_amount: 1000,
            decrease_factor: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionState {
    /// The window grows by the fulfilled amount, doubling per round trip.
    SlowStart,
    /// The window grows by `increase_amount` per fulfilled packet.
    AvoidCongestion,
}

struct AimdState {
    window: u64,
    in_flight: u64,
    state: CongestionState,
    max_packet_amount: Option<u64>,
}

/// AIMD controller guarded by a single mutex, so the window and the in-flight amount
/// are always updated together.
pub struct AimdController {
    increase_amount: u64,
    decrease_factor: u64,
    inner: Mutex<AimdState>,
}

impl AimdController {
    pub fn new(config: &AimdConfig) -> Self {
        Self {
            increase_amount: config.increase_amount,
            decrease_factor: config.decrease_factor.max(2),
            inner: Mutex::new(AimdState {
                window: config.initial_window,
                in_flight: 0,
                state: CongestionState::SlowStart,
                max_packet_amount: None,
            }),
        }
    }
}

impl CongestionControl for AimdController {
    fn max_amount(&self) -> u64 {
        let inner = self.inner.lock();
        let left = inner.window.saturating_sub(inner.in_flight);
        match inner.max_packet_amount {
            Some(max) => left.min(max),
            None => left,
        }
    }

    fn prepare(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_add(amount);
    }

    fn fulfill(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);
        inner.window = match inner.state {
            CongestionState::SlowStart => inner.window.saturating_add(amount),
            CongestionState::AvoidCongestion => inner.window.saturating_add(self.increase_amount),
        };
        tracing::trace!(window = inner.window, in_flight = inner.in_flight, "window grew after fulfill");
    }

    fn reject(&self, amount: u64, reject: &RejectPacket) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);

        match reject.code {
            ErrorCode::F08_AMOUNT_TOO_LARGE => {
                let path_max = reject
                    .amount_too_large_data()
                    .map(|data| data.max_source_amount(amount))
                    .unwrap_or_else(|| amount.saturating_sub(1));
                let max_packet = inner.max_packet_amount.map_or(path_max, |m| m.min(path_max));
                inner.max_packet_amount = Some(max_packet);

                let decreased = (inner.window / self.decrease_factor).max(1);
                inner.window = decreased.min(max_packet);
                inner.state = CongestionState::AvoidCongestion;
                tracing::debug!(
                    amount,
                    max_packet,
                    window = inner.window,
                    "amount too large, shrinking window"
                );
            }
            ErrorCode::T04_INSUFFICIENT_LIQUIDITY => {
                inner.window = (inner.window / self.decrease_factor).max(1);
                inner.state = CongestionState::AvoidCongestion;
                tracing::debug!(amount, window = inner.window, "insufficient liquidity, shrinking window");
            }
            // not evidence of congestion
            _ => {}
        }
    }

    fn timeout(&self, amount: u64) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(amount);
    }

    fn stats(&self) -> CongestionControlStats {
        let inner = self.inner.lock();
        CongestionControlStats {
            window: inner.window,
            in_flight: inner.in_flight,
            state: inner.state,
            max_packet_amount: inner.max_packet_amount,
        }
    }
}
