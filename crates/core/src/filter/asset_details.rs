use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, SendState, StreamPacketFilter, StreamPacketReply,
    StreamPacketRequest,
};
use crate::connection::StreamConnection;
use crate::packet::InterledgerAddress;
use crate::stream::{Denomination, StreamFrame};
use crate::tracker::AssetDetailsTracker;

/// Exchanges asset details with the receiver: announces the source account until the
/// destination asset is known, then holds the receiver to its first answer.
pub struct AssetDetailsFilter {
    connection: Arc<StreamConnection>,
    source_address: InterledgerAddress,
    source_denomination: Denomination,
    tracker: Arc<AssetDetailsTracker>,
}

impl AssetDetailsFilter {
    pub fn new(
        connection: Arc<StreamConnection>,
        source_address: InterledgerAddress,
        source_denomination: Denomination,
        tracker: Arc<AssetDetailsTracker>,
    ) -> Self {
        Self {
            connection,
            source_address,
            source_denomination,
            tracker,
        }
    }
}

impl StreamPacketFilter for AssetDetailsFilter {
    fn next_state(&self, draft: &mut PacketDraft) -> SendState {
        if self.tracker.conflict().is_some() {
            return SendState::DestinationAssetConflict;
        }
        if self.connection.destination_denomination().is_none() {
            draft.frames.push(StreamFrame::ConnectionNewAddress {
                source_address: self.source_address.clone(),
            });
            draft
                .frames
                .push(StreamFrame::asset_details(&self.source_denomination));
        }
        SendState::Ready
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        let connection = self.connection.clone();
        let tracker = self.tracker.clone();
        let inner = chain.do_filter(request);
        async move {
            let reply = inner.await;
            if let Some(reported) = reply.peer_packet().and_then(|packet| packet.asset_details()) {
                tracker.record(&connection, reported);
            }
            reply
        }
        .boxed()
    }
}
