//! Congestion control interface for STREAM payments.
//!
//! A controller bounds the value in flight on a connection. It never fails: every
//! response only adjusts numeric state, so the worst a hostile reply can do is make
//! the sender use smaller packets or wait.
//!
//! ## Supported Algorithms
//!
//! - **AIMD** (default): slow start doubling until the first capacity signal, then
//!   additive increase on fulfill and multiplicative decrease on `F08`/`T04`.

use crate::packet::RejectPacket;

mod aimd;

pub use self::aimd::{AimdConfig, AimdController, CongestionState};

/// Snapshot of a controller for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionControlStats {
    /// Ceiling of the value allowed in flight.
    pub window: u64,
    /// Sum of prepared but unresolved amounts.
    pub in_flight: u64,
    pub state: CongestionState,
    /// Largest amount the path accepted so far.
    pub max_packet_amount: Option<u64>,
}

/// Operations every congestion control algorithm supports.
///
/// Implementations must be `Send + Sync`: replies of concurrent packets update the
/// controller from different tasks.
pub trait CongestionControl: Send + Sync {
    /// Amount that may still be prepared right now: `max(0, window - in_flight)`.
    fn max_amount(&self) -> u64;

    /// Records `amount` as in flight. Called before the packet is sent.
    fn prepare(&self, amount: u64);

    /// The packet was fulfilled. The only path that grows the window.
    fn fulfill(&self, amount: u64);

    /// The packet was rejected.
    fn reject(&self, amount: u64, reject: &RejectPacket);

    /// No response arrived. Ambiguous, so only the in-flight amount is released.
    fn timeout(&self, amount: u64);

    fn stats(&self) -> CongestionControlStats;
}
