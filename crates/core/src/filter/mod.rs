//! The ordered filter pipeline every STREAM packet goes through.
//!
//! Each filter plays two roles:
//!
//! - **Readiness** ([`StreamPacketFilter::next_state`]): before a packet is built the
//!   chain asks every filter, in order, whether a packet may be sent now. The first
//!   verdict other than [`SendState::Ready`] wins and later filters are not asked.
//!   Filters may shape the [`PacketDraft`] (amounts, frames) but never touch shared
//!   trackers here.
//! - **Dispatch** ([`StreamPacketFilter::do_filter`]): once a packet is sent every
//!   filter wraps the call. Work before the inner call happens synchronously, so the
//!   in-flight accounting of a packet is visible to the next readiness check even
//!   though the packet itself runs on its own task. The innermost step is the
//!   [`PacketDispatcher`], which seals the packet, talks to the link and opens the
//!   reply.
//!
//! ## Filter Order
//!
//! Sequence, Failure, AssetDetails, MaxPacketAmount, Pacing, Amount, ExchangeRate.
//!
//! No error leaves the chain: every failure while building, sending or interpreting
//! a packet is carried inside the [`StreamPacketReply`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::link::LinkError;
use crate::packet::{AmountTooLargeErrorData, ErrorCode, FulfillPacket, PreparePacket, RejectPacket};
use crate::stream::{StreamFrame, StreamPacket};

mod amount;
mod asset_details;
mod dispatcher;
mod exchange_rate;
mod failure;
mod max_packet_amount;
mod pacing;
mod sequence;

pub use self::amount::AmountFilter;
pub use self::asset_details::AssetDetailsFilter;
pub use self::dispatcher::PacketDispatcher;
pub use self::exchange_rate::ExchangeRateFilter;
pub use self::failure::FailureFilter;
pub use self::max_packet_amount::MaxPacketAmountFilter;
pub use self::pacing::PacingFilter;
pub use self::sequence::SequenceFilter;


/// Verdict of the readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// A packet may be sent now.
    Ready,
    /// Nothing can be sent until some in-flight packet resolves or time passes.
    Wait,
    /// The payment is complete.
    End,
    ConnectionClosed,
    PeerClosedConnection,
    DestinationAssetConflict,
    MaxPacketAmountTooSmall,
    ExchangeRateUnknown,
    InsufficientExchangeRate,
    FinalReject(ErrorCode),
    UnauthenticatedReply,
    TooManyTransientFailures,
    LocalFailure,
}

impl SendState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SendState::Ready)
    }

    /// Whether the verdict ends the payment with a failure.
    pub fn is_payment_error(&self) -> bool {
        !matches!(self, SendState::Ready | SendState::Wait | SendState::End)
    }
}

/// A packet under construction during the readiness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketDraft {
    pub source_amount: u64,
    pub min_destination_amount: u64,
    pub fulfillable: bool,
    pub frames: Vec<StreamFrame>,
}

impl PacketDraft {
    pub fn into_request(self, sequence: u64) -> StreamPacketRequest {
        StreamPacketRequest {
            sequence,
            source_amount: self.source_amount,
            min_destination_amount: self.min_destination_amount,
            fulfillable: self.fulfillable,
            frames: self.frames,
        }
    }
}

/// A packet the filters agreed to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPacketRequest {
    pub sequence: u64,
    pub source_amount: u64,
    pub min_destination_amount: u64,
    pub fulfillable: bool,
    pub frames: Vec<StreamFrame>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("packet expired before it was sent")]
    Expired,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("stream packet could not be sealed or opened")]
    Crypto,
    #[error("stream packet could not be encoded or decoded")]
    Codec,
    #[error("fulfillment does not match the execution condition")]
    InvalidFulfillment,
    #[error("reply does not belong to the request: {0}")]
    MismatchedResponse(&'static str),
    #[error("stream packet of {0} bytes does not fit in an ILP packet")]
    PayloadTooLarge(usize),
    #[error("sequence {0} is outside the connection's sequence space")]
    InvalidSequence(u64),
}

impl ReplyError {
    /// Errors of the path rather than of this packet or the peer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReplyError::Expired | ReplyError::Timeout(_) | ReplyError::Link(_)
        )
    }
}

/// What a reject carried besides its code.
#[derive(Debug)]
pub enum RejectDetails {
    /// Authentic STREAM packet from the receiver.
    StreamPacket(StreamPacket),
    /// Connector capacity report of an `F08`.
    AmountTooLarge(AmountTooLargeErrorData),
    /// Nothing usable, typically a reject raised by an intermediary.
    Opaque,
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Fulfilled {
        fulfill: FulfillPacket,
        /// The receiver's STREAM packet, or why it could not be opened.
        peer: Result<StreamPacket, ReplyError>,
    },
    Rejected {
        reject: RejectPacket,
        details: RejectDetails,
    },
    Errored(ReplyError),
}

#[derive(Debug)]
pub struct StreamPacketReply {
    pub request: StreamPacketRequest,
    /// The prepare as sent, absent if the packet never got that far.
    pub prepare: Option<PreparePacket>,
    pub outcome: ReplyOutcome,
}

impl StreamPacketReply {
    pub fn errored(request: StreamPacketRequest, error: ReplyError) -> Self {
        Self {
            request,
            prepare: None,
            outcome: ReplyOutcome::Errored(error),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Fulfilled { .. })
    }

    pub fn reject(&self) -> Option<&RejectPacket> {
        match &self.outcome {
            ReplyOutcome::Rejected { reject, .. } => Some(reject),
            _ => None,
        }
    }

    /// The authenticated STREAM packet of the receiver, from a fulfill or a reject.
    pub fn peer_packet(&self) -> Option<&StreamPacket> {
        match &self.outcome {
            ReplyOutcome::Fulfilled { peer: Ok(packet), .. } => Some(packet),
            ReplyOutcome::Rejected {
                details: RejectDetails::StreamPacket(packet),
                ..
            } => Some(packet),
            _ => None,
        }
    }
}

/// One stage of the pipeline.
pub trait StreamPacketFilter: Send + Sync + 'static {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        SendState::Ready
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        chain.do_filter(request)
    }
}

/// An immutable filter list plus the position of the next filter to run.
///
/// The position travels by value, so any number of packets can walk the same chain
/// concurrently.
#[derive(Clone)]
pub struct FilterChain {
    filters: Arc<[Arc<dyn StreamPacketFilter>]>,
    dispatcher: Arc<PacketDispatcher>,
    index: usize,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn StreamPacketFilter>>, dispatcher: Arc<PacketDispatcher>) -> Self {
        Self {
            filters: filters.into(),
            dispatcher,
            index: 0,
        }
    }

    /// Asks every filter in order; the first non-ready verdict wins.
    pub fn next_state(&self, draft: &mut PacketDraft) -> SendState {
        for filter in self.filters.iter() {
            let state = filter.next_state(draft);
            if !state.is_ready() {
                return state;
            }
        }
        SendState::Ready
    }

    /// Runs the remaining filters around the dispatcher.
    pub fn do_filter(self, request: StreamPacketRequest) -> BoxFuture<'static, StreamPacketReply> {
        match self.filters.get(self.index).cloned() {
            Some(filter) => {
                let rest = FilterChain {
                    index: self.index + 1,
                    ..self
                };
                filter.do_filter(request, rest)
            }
            None => self.dispatcher.dispatch(request),
        }
    }
}
