//! State shared by the filters of one payment attempt.
//!
//! The prober and the payment run loop use the same [`PaymentSharedState`], so what
//! the probes learnt about rates and capacity carries over to the real packets.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SenderConfig;
use crate::congestion::{AimdController, CongestionControl};
use crate::connection::{ConnectionError, StreamConnection};
use crate::stream::Denomination;

mod amount;
mod exchange_rate;
mod failure;
mod max_packet;

pub use self::amount::{AmountSnapshot, AmountTracker};
pub use self::exchange_rate::{ExchangeRateTracker, RateBounds};
pub use self::failure::{FailureTracker, TerminalFailure};
pub use self::max_packet::{MaxPacketAmount, MaxPacketAmountTracker};

/// Remembers the first time the receiver reported a different asset than before.
#[derive(Default)]
pub struct AssetDetailsTracker {
    conflict: Mutex<Option<(Denomination, Denomination)>>,
}

impl AssetDetailsTracker {
    pub fn record(&self, connection: &StreamConnection, reported: Denomination) {
        if let Err(ConnectionError::DenominationConflict { known, reported }) =
            connection.set_destination_denomination(reported)
        {
            tracing::warn!(connection = %connection.id(), %known, %reported, "receiver changed its asset");
            self.conflict.lock().get_or_insert((known, reported));
        }
    }

    pub fn conflict(&self) -> Option<(Denomination, Denomination)> {
        self.conflict.lock().clone()
    }
}

#[derive(Clone)]
pub struct PaymentSharedState {
    pub exchange_rate: Arc<ExchangeRateTracker>,
    pub max_packet: Arc<MaxPacketAmountTracker>,
    pub amounts: Arc<AmountTracker>,
    pub failures: Arc<FailureTracker>,
    pub asset_details: Arc<AssetDetailsTracker>,
    pub congestion: Arc<dyn CongestionControl>,
}

impl PaymentSharedState {
    pub fn new(config: &SenderConfig, target_amount: u64) -> Self {
        Self {
            exchange_rate: Arc::new(ExchangeRateTracker::new()),
            max_packet: Arc::new(MaxPacketAmountTracker::new()),
            amounts: Arc::new(AmountTracker::new(target_amount)),
            failures: Arc::new(FailureTracker::new(config.max_transient_failures)),
            asset_details: Arc::new(AssetDetailsTracker::default()),
            congestion: Arc::new(AimdController::new(&config.congestion)),
        }
    }
}
