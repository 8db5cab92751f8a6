use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, ReplyOutcome, SendState, StreamPacketFilter, StreamPacketReply,
    StreamPacketRequest,
};
use crate::congestion::CongestionControl;
use crate::stream::StreamFrame;
use crate::tracker::{AmountTracker, ExchangeRateTracker, MaxPacketAmountTracker};
use crate::util::Ratio;

const PPM: u64 = 1_000_000;

/// Sizes each packet and accounts for what it sent and delivered.
pub struct AmountFilter {
    amounts: Arc<AmountTracker>,
    exchange_rate: Arc<ExchangeRateTracker>,
    max_packet: Arc<MaxPacketAmountTracker>,
    congestion: Arc<dyn CongestionControl>,
    slippage_ppm: u64,
}

impl AmountFilter {
    pub fn new(
        amounts: Arc<AmountTracker>,
        exchange_rate: Arc<ExchangeRateTracker>,
        max_packet: Arc<MaxPacketAmountTracker>,
        congestion: Arc<dyn CongestionControl>,
        max_slippage: f64,
    ) -> Self {
        let slippage_ppm = (max_slippage.clamp(0.0, 1.0) * PPM as f64).round() as u64;
        Self {
            amounts,
            exchange_rate,
            max_packet,
            congestion,
            slippage_ppm,
        }
    }
}

/// `floor(source * rate * (1 - slippage))`, rounding down at every step.
pub(crate) fn min_destination_amount(source: u64, rate: Ratio, slippage_ppm: u64) -> u64 {
    let converted = rate.apply_floor(source) as u128;
    let tolerated = converted * PPM.saturating_sub(slippage_ppm) as u128 / PPM as u128;
    tolerated as u64
}

impl StreamPacketFilter for AmountFilter {
    fn next_state(&self, draft: &mut PacketDraft) -> SendState {
        let remaining = self.amounts.remaining_to_send();
        if remaining == 0 {
            return if self.amounts.snapshot().in_flight == 0 {
                SendState::End
            } else {
                SendState::Wait
            };
        }
        let Some(rate) = self.exchange_rate.lower_bound() else {
            return SendState::ExchangeRateUnknown;
        };

        let mut amount = remaining.min(self.congestion.max_amount());
        if let Some(max) = self.max_packet.max_packet_amount() {
            amount = amount.min(max);
        }
        if amount == 0 {
            return SendState::Wait;
        }

        draft.source_amount = amount;
        draft.min_destination_amount = min_destination_amount(amount, rate, self.slippage_ppm);
        draft.fulfillable = true;
        draft.frames.push(StreamFrame::StreamMoney {
            stream_id: 1,
            shares: 1,
        });
        SendState::Ready
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        let amount = request.source_amount;
        self.amounts.prepare(amount);
        self.congestion.prepare(amount);

        let amounts = self.amounts.clone();
        let congestion = self.congestion.clone();
        let inner = chain.do_filter(request);
        async move {
            let reply = inner.await;
            match &reply.outcome {
                ReplyOutcome::Fulfilled { peer, .. } => {
                    let delivered = match peer {
                        Ok(packet) => packet.prepare_amount,
                        Err(_) => reply.request.min_destination_amount,
                    };
                    amounts.fulfill(amount, delivered);
                    congestion.fulfill(amount);
                }
                ReplyOutcome::Rejected { reject, .. } => {
                    amounts.reject(amount);
                    congestion.reject(amount, reject);
                }
                ReplyOutcome::Errored(_) => {
                    amounts.error(amount);
                    congestion.timeout(amount);
                }
            }
            reply
        }
        .boxed()
    }
}
