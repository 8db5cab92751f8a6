use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, ReplyOutcome, SendState, StreamPacketFilter, StreamPacketReply,
    StreamPacketRequest,
};
use crate::tracker::ExchangeRateTracker;
use crate::util::Ratio;

/// Feeds authenticated `(sent, received)` pairs into the rate tracker and stops the
/// payment if the path cannot meet the required rate.
pub struct ExchangeRateFilter {
    tracker: Arc<ExchangeRateTracker>,
    min_exchange_rate: Option<Ratio>,
}

impl ExchangeRateFilter {
    pub fn new(tracker: Arc<ExchangeRateTracker>, min_exchange_rate: Option<Ratio>) -> Self {
        Self {
            tracker,
            min_exchange_rate,
        }
    }
}

impl StreamPacketFilter for ExchangeRateFilter {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        match (self.min_exchange_rate, self.tracker.upper_bound()) {
            (Some(required), Some(upper)) if required > upper => {
                tracing::debug!(%required, %upper, "path rate below the required minimum");
                SendState::InsufficientExchangeRate
            }
            _ => SendState::Ready,
        }
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        let tracker = self.tracker.clone();
        let inner = chain.do_filter(request);
        async move {
            let reply = inner.await;
            let capacity_reject = matches!(&reply.outcome, ReplyOutcome::Rejected { reject, .. } if reject.is_amount_too_large());
            if !capacity_reject {
                if let Some(packet) = reply.peer_packet() {
                    tracker.update(reply.request.source_amount, packet.prepare_amount);
                }
            }
            reply
        }
        .boxed()
    }
}
