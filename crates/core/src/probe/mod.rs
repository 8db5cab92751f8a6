//! Calibration before a payment.
//!
//! The prober fires unfulfillable packets of a descending geometric series of amounts
//! in parallel. No value moves, but the replies reveal:
//!
//! - the destination asset, from the receiver's `ConnectionAssetDetails` frame;
//! - the path's packet ceiling, from `F08` rejects of the larger probes;
//! - exchange rate bounds, from the amount the receiver reports for each probe that
//!   reached it.
//!
//! Everything is recorded in the [`PaymentSharedState`] the payment then reuses.
//! Probing never fails: lost or late probes only make the outcome less precise.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::connection::StreamConnection;
use crate::filter::{
    AssetDetailsFilter, ExchangeRateFilter, FilterChain, MaxPacketAmountFilter, PacketDispatcher,
    PacketDraft, SendState, SequenceFilter, StreamPacketFilter, StreamPacketReply,
};
use crate::packet::InterledgerAddress;
use crate::stream::Denomination;
use crate::tracker::{PaymentSharedState, RateBounds};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe before every payment.
    pub enabled: bool,
    /// Source amounts of the probes, all sent at once.
    pub amounts: Vec<u64>,
    /// Overall deadline for all probe replies.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let mut amounts: Vec<u64> = (0..=12).rev().map(|exp| 10u64.pow(exp)).collect();
        amounts.push(0);
        Self {
            enabled: true,
            amounts,
            timeout_ms: 10_000,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What the probes learnt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub destination_denomination: Option<Denomination>,
    pub max_packet_amount: Option<u64>,
    /// Largest probe amount that reached the receiver.
    pub verified_packet_amount: u64,
    pub rate_bounds: Option<RateBounds>,
    pub probes_sent: usize,
    /// Probes that got any reply before the deadline.
    pub replies: usize,
}

/// Sender-side context a probe run needs.
pub(crate) struct ProbeContext<'a> {
    pub connection: &'a Arc<StreamConnection>,
    pub dispatcher: Arc<PacketDispatcher>,
    pub source_address: &'a InterledgerAddress,
    pub source_denomination: &'a Denomination,
    pub min_packet_amount: u64,
}

pub struct ExchangeRateProber {
    config: ProbeConfig,
}

impl ExchangeRateProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn chain(&self, context: &ProbeContext<'_>, state: &PaymentSharedState) -> FilterChain {
        let filters: Vec<Arc<dyn StreamPacketFilter>> = vec![
            Arc::new(SequenceFilter::new(context.connection.clone())),
            Arc::new(AssetDetailsFilter::new(
                context.connection.clone(),
                context.source_address.clone(),
                context.source_denomination.clone(),
                state.asset_details.clone(),
            )),
            Arc::new(MaxPacketAmountFilter::new(
                state.max_packet.clone(),
                context.min_packet_amount,
            )),
            Arc::new(ExchangeRateFilter::new(state.exchange_rate.clone(), None)),
        ];
        FilterChain::new(filters, context.dispatcher.clone())
    }

    #[tracing::instrument(skip_all, fields(connection = %context.connection.id(), probes = self.config.amounts.len()))]
    pub(crate) async fn probe(
        &self,
        context: ProbeContext<'_>,
        state: &PaymentSharedState,
    ) -> ProbeOutcome {
        let chain = self.chain(&context, state);
        let mut pending: FuturesUnordered<JoinHandle<StreamPacketReply>> = FuturesUnordered::new();

        for &amount in &self.config.amounts {
            let mut draft = PacketDraft {
                source_amount: amount,
                ..PacketDraft::default()
            };
            match chain.next_state(&mut draft) {
                SendState::ConnectionClosed => {
                    tracing::warn!(amount, "connection closed, no more probes");
                    break;
                }
                SendState::DestinationAssetConflict => {
                    tracing::warn!(amount, "destination asset conflict, no more probes");
                    break;
                }
                _ => {}
            }
            let sequence = match context.connection.next_sequence() {
                Ok(sequence) => sequence,
                Err(error) => {
                    tracing::warn!(amount, %error, "no sequence left for probe");
                    break;
                }
            };
            let request = draft.into_request(sequence);
            pending.push(tokio::spawn(chain.clone().do_filter(request)));
        }

        let probes_sent = pending.len();
        let mut replies = 0;
        let collect = async {
            while let Some(joined) = pending.next().await {
                match joined {
                    Ok(reply) => {
                        replies += 1;
                        tracing::trace!(sequence = reply.request.sequence, amount = reply.request.source_amount, outcome = ?reply.outcome, "probe reply");
                    }
                    Err(error) => tracing::warn!(%error, "probe task failed"),
                }
            }
        };
        if tokio::time::timeout(self.config.timeout(), collect).await.is_err() {
            tracing::warn!(
                outstanding = pending.len(),
                timeout = ?self.config.timeout(),
                "probe deadline passed, continuing with partial results"
            );
            for handle in pending.iter() {
                handle.abort();
            }
        }

        let outcome = ProbeOutcome {
            destination_denomination: context.connection.destination_denomination(),
            max_packet_amount: state.max_packet.max_packet_amount(),
            verified_packet_amount: state.max_packet.verified_packet_amount(),
            rate_bounds: state.exchange_rate.bounds(),
            probes_sent,
            replies,
        };
        tracing::info!(
            replies = outcome.replies,
            max_packet_amount = ?outcome.max_packet_amount,
            lower_rate = ?outcome.rate_bounds.map(|b| b.lower.to_string()),
            upper_rate = ?outcome.rate_bounds.map(|b| b.upper.to_string()),
            "probing finished"
        );
        outcome
    }
}
