use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, ReplyError, SendState, StreamPacketFilter, StreamPacketReply,
    StreamPacketRequest,
};
use crate::connection::{StreamConnection, MAX_SEQUENCE};

/// Refuses to send on a closed or exhausted connection.
pub struct SequenceFilter {
    connection: Arc<StreamConnection>,
}

impl SequenceFilter {
    pub fn new(connection: Arc<StreamConnection>) -> Self {
        Self { connection }
    }
}

impl StreamPacketFilter for SequenceFilter {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        if self.connection.is_closed() || self.connection.is_sequence_exhausted() {
            return SendState::ConnectionClosed;
        }
        SendState::Ready
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        let sequence = request.sequence;
        if sequence == 0 || sequence > MAX_SEQUENCE {
            tracing::error!(connection = %self.connection.id(), sequence, "refusing to send invalid sequence");
            return futures::future::ready(StreamPacketReply::errored(
                request,
                ReplyError::InvalidSequence(sequence),
            ))
            .boxed();
        }
        self.connection.mark_open();
        chain.do_filter(request)
    }
}
