use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::{RejectDetails, ReplyError, ReplyOutcome, StreamPacketReply, StreamPacketRequest};
use crate::connection::StreamConnection;
use crate::crypto::{self, CipherMode, SharedSecret, UNFULFILLABLE_CONDITION};
use crate::link::Link;
use crate::packet::{
    AmountTooLargeErrorData, FulfillPacket, IlpResponse, PreparePacket, RejectPacket,
    MAX_DATA_SIZE,
};
use crate::stream::{StreamPacket, StreamPacketType};

/// Last step of every chain: seals the STREAM packet into an ILP prepare, sends it
/// and opens the response.
pub struct PacketDispatcher {
    link: Arc<dyn Link>,
    connection: Arc<StreamConnection>,
    cipher_mode: CipherMode,
    packet_timeout: Duration,
}

impl PacketDispatcher {
    pub fn new(
        link: Arc<dyn Link>,
        connection: Arc<StreamConnection>,
        cipher_mode: CipherMode,
        packet_timeout: Duration,
    ) -> Self {
        Self {
            link,
            connection,
            cipher_mode,
            packet_timeout,
        }
    }

    pub fn connection(&self) -> &Arc<StreamConnection> {
        &self.connection
    }

    pub fn dispatch(&self, request: StreamPacketRequest) -> BoxFuture<'static, StreamPacketReply> {
        let prepare = match self.seal(&request) {
            Ok(prepare) => prepare,
            Err(error) => {
                tracing::warn!(sequence = request.sequence, %error, "failed to build prepare");
                return futures::future::ready(StreamPacketReply::errored(request, error)).boxed();
            }
        };

        let link = self.link.clone();
        let secret = self.connection.shared_secret().clone();
        let cipher_mode = self.cipher_mode;
        async move {
            let sequence = request.sequence;
            let remaining = (prepare.expires_at - Utc::now())
                .to_std()
                .ok()
                .filter(|remaining| !remaining.is_zero());
            let Some(remaining) = remaining else {
                tracing::debug!(sequence, "prepare expired before dispatch, not sending");
                return StreamPacketReply {
                    request,
                    prepare: Some(prepare),
                    outcome: ReplyOutcome::Errored(ReplyError::Expired),
                };
            };

            tracing::debug!(
                sequence,
                amount = prepare.amount,
                min_destination_amount = request.min_destination_amount,
                fulfillable = request.fulfillable,
                "sending prepare"
            );
            let outcome = match tokio::time::timeout(remaining, link.send(prepare.clone())).await {
                Err(_) => {
                    tracing::debug!(sequence, ?remaining, "prepare timed out");
                    ReplyOutcome::Errored(ReplyError::Timeout(remaining))
                }
                Ok(Err(error)) => {
                    tracing::debug!(sequence, %error, "link failed");
                    ReplyOutcome::Errored(ReplyError::Link(error))
                }
                Ok(Ok(IlpResponse::Fulfill(fulfill))) => {
                    open_fulfill(&secret, cipher_mode, &prepare, sequence, fulfill)
                }
                Ok(Ok(IlpResponse::Reject(reject))) => {
                    open_reject(&secret, cipher_mode, sequence, reject)
                }
            };

            StreamPacketReply {
                request,
                prepare: Some(prepare),
                outcome,
            }
        }
        .boxed()
    }

    fn seal(&self, request: &StreamPacketRequest) -> Result<PreparePacket, ReplyError> {
        let secret = self.connection.shared_secret();
        let packet = StreamPacket {
            packet_type: StreamPacketType::Prepare,
            sequence: request.sequence,
            prepare_amount: request.min_destination_amount,
            frames: request.frames.clone(),
        };
        let plaintext = packet.to_bytes().map_err(|_| ReplyError::Codec)?;
        let data = crypto::encrypt(secret, &plaintext, self.cipher_mode)
            .map_err(|_| ReplyError::Crypto)?;
        if data.len() > MAX_DATA_SIZE {
            return Err(ReplyError::PayloadTooLarge(data.len()));
        }

        let execution_condition = if request.fulfillable {
            crypto::derive_condition(secret, &data)
        } else {
            UNFULFILLABLE_CONDITION
        };
        let expires_at = chrono::Duration::from_std(self.packet_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_add_signed(timeout))
            .ok_or(ReplyError::Expired)?;

        Ok(PreparePacket {
            destination: self.connection.destination().clone(),
            amount: request.source_amount,
            execution_condition,
            expires_at,
            data: data.into(),
        })
    }
}

fn open_fulfill(
    secret: &SharedSecret,
    cipher_mode: CipherMode,
    prepare: &PreparePacket,
    sequence: u64,
    fulfill: FulfillPacket,
) -> ReplyOutcome {
    if !crypto::condition_matches(&prepare.execution_condition, &fulfill.fulfillment) {
        tracing::warn!(sequence, "fulfillment does not match the execution condition");
        return ReplyOutcome::Errored(ReplyError::InvalidFulfillment);
    }
    let peer = open_stream_packet(
        secret,
        cipher_mode,
        &fulfill.data,
        sequence,
        StreamPacketType::Fulfill,
    );
    if let Err(error) = &peer {
        tracing::warn!(sequence, %error, "fulfill carries no authentic stream packet");
    }
    ReplyOutcome::Fulfilled { fulfill, peer }
}

fn open_reject(
    secret: &SharedSecret,
    cipher_mode: CipherMode,
    sequence: u64,
    reject: RejectPacket,
) -> ReplyOutcome {
    // F08s are raised by connectors, which cannot encrypt for the receiver
    let details = if reject.is_amount_too_large() {
        match AmountTooLargeErrorData::decode(&reject.data) {
            Ok(data) => RejectDetails::AmountTooLarge(data),
            Err(error) => {
                tracing::debug!(sequence, %error, "F08 without usable metadata");
                RejectDetails::Opaque
            }
        }
    } else if reject.data.is_empty() {
        RejectDetails::Opaque
    } else {
        match open_stream_packet(
            secret,
            cipher_mode,
            &reject.data,
            sequence,
            StreamPacketType::Reject,
        ) {
            Ok(packet) => RejectDetails::StreamPacket(packet),
            Err(error) => {
                tracing::trace!(sequence, code = %reject.code, %error, "reject data is not from the receiver");
                RejectDetails::Opaque
            }
        }
    };
    tracing::debug!(sequence, code = %reject.code, message = %reject.message, "prepare rejected");
    ReplyOutcome::Rejected { reject, details }
}

fn open_stream_packet(
    secret: &SharedSecret,
    cipher_mode: CipherMode,
    data: &[u8],
    sequence: u64,
    expected: StreamPacketType,
) -> Result<StreamPacket, ReplyError> {
    let plaintext = crypto::decrypt(secret, data, cipher_mode).map_err(|_| ReplyError::Crypto)?;
    let packet = StreamPacket::from_bytes(&plaintext).map_err(|_| ReplyError::Codec)?;
    if packet.packet_type != expected {
        return Err(ReplyError::MismatchedResponse("packet type"));
    }
    if packet.sequence != sequence {
        return Err(ReplyError::MismatchedResponse("sequence"));
    }
    Ok(packet)
}
