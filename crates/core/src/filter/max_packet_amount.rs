use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, RejectDetails, ReplyOutcome, SendState, StreamPacketFilter,
    StreamPacketReply, StreamPacketRequest,
};
use crate::tracker::MaxPacketAmountTracker;

/// Learns the path ceiling from `F08` rejects and gives up once it drops below the
/// smallest packet worth sending.
pub struct MaxPacketAmountFilter {
    tracker: Arc<MaxPacketAmountTracker>,
    min_packet_amount: u64,
}

impl MaxPacketAmountFilter {
    pub fn new(tracker: Arc<MaxPacketAmountTracker>, min_packet_amount: u64) -> Self {
        Self {
            tracker,
            min_packet_amount,
        }
    }
}

impl StreamPacketFilter for MaxPacketAmountFilter {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        match self.tracker.max_packet_amount() {
            Some(max) if max == 0 || max < self.min_packet_amount => {
                SendState::MaxPacketAmountTooSmall
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
            let sent = reply.request.source_amount;
            match &reply.outcome {
                ReplyOutcome::Rejected { reject, details } if reject.is_amount_too_large() => {
                    let data = match details {
                        RejectDetails::AmountTooLarge(data) => Some(*data),
                        _ => None,
                    };
                    tracker.reduce(sent, data);
                }
                _ if reply.peer_packet().is_some() => tracker.record_verified(sent),
                _ => {}
            }
            reply
        }
        .boxed()
    }
}
