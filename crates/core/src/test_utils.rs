//! A connector path plus STREAM receiver, simulated just far enough to drive the
//! sender end to end.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::crypto::{self, CipherMode, SharedSecret};
use crate::link::{Link, LinkError};
use crate::packet::{
    AmountTooLargeErrorData, ErrorCode, FulfillPacket, IlpResponse, InterledgerAddress,
    PreparePacket, RejectPacket,
};
use crate::stream::{CloseCode, Denomination, StreamFrame, StreamPacket, StreamPacketType};
use crate::util::Ratio;

pub(crate) fn receiver_address() -> InterledgerAddress {
    InterledgerAddress::new("test.connector.receiver").expect("valid address")
}

pub(crate) fn sender_address() -> InterledgerAddress {
    InterledgerAddress::new("test.connector.sender").expect("valid address")
}

pub(crate) fn source_denomination() -> Denomination {
    Denomination::new("USD", 2)
}

/// Applies `rate` to every prepare, rejects anything above `max_packet_amount` with
/// `F08` and fulfills when the receiver gets at least the minimum the sender asked for.
pub(crate) struct SimulatedReceiver {
    secret: SharedSecret,
    rate: Ratio,
    max_packet_amount: Option<u64>,
    denomination: Denomination,
    cipher_mode: CipherMode,
    latency: Duration,
    hang_above: Option<u64>,
    reject_with: Option<ErrorCode>,
    reject_payments_with: Option<ErrorCode>,
    close_connection: bool,
    prepares: AtomicUsize,
    fulfilled: AtomicUsize,
    total_received: AtomicU64,
    largest_fulfilled: AtomicU64,
}

impl SimulatedReceiver {
    pub fn new(secret: SharedSecret, rate: Ratio) -> Self {
        Self {
            secret,
            rate,
            max_packet_amount: None,
            denomination: Denomination::new("EUR", 6),
            cipher_mode: CipherMode::default(),
            latency: Duration::ZERO,
            hang_above: None,
            reject_with: None,
            reject_payments_with: None,
            close_connection: false,
            prepares: AtomicUsize::new(0),
            fulfilled: AtomicUsize::new(0),
            total_received: AtomicU64::new(0),
            largest_fulfilled: AtomicU64::new(0),
        }
    }

    pub fn with_max_packet_amount(mut self, max: u64) -> Self {
        self.max_packet_amount = Some(max);
        self
    }

    pub fn with_denomination(mut self, denomination: Denomination) -> Self {
        self.denomination = denomination;
        self
    }

    pub fn with_cipher_mode(mut self, cipher_mode: CipherMode) -> Self {
        self.cipher_mode = cipher_mode;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Never answers prepares larger than `amount`.
    pub fn hanging_above(mut self, amount: u64) -> Self {
        self.hang_above = Some(amount);
        self
    }

    /// Rejects every prepare with `code` and no data, like a connector would.
    pub fn rejecting_with(mut self, code: ErrorCode) -> Self {
        self.reject_with = Some(code);
        self
    }

    /// Answers probes normally but rejects every fulfillable prepare with `code`.
    pub fn rejecting_payments_with(mut self, code: ErrorCode) -> Self {
        self.reject_payments_with = Some(code);
        self
    }

    /// Adds a `ConnectionClose` frame to every reply.
    pub fn closing_connection(mut self) -> Self {
        self.close_connection = true;
        self
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn fulfilled(&self) -> usize {
        self.fulfilled.load(Ordering::SeqCst)
    }

    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::SeqCst)
    }

    /// Source amount of the largest fulfilled prepare.
    pub fn largest_fulfilled(&self) -> u64 {
        self.largest_fulfilled.load(Ordering::SeqCst)
    }

    async fn respond(&self, prepare: PreparePacket) -> Result<IlpResponse, LinkError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.hang_above.is_some_and(|limit| prepare.amount > limit) {
            futures::future::pending::<()>().await;
        }
        if let Some(code) = self.reject_with {
            return Ok(reject(code, Bytes::new()));
        }
        if let Some(max) = self.max_packet_amount {
            if prepare.amount > max {
                let data = AmountTooLargeErrorData {
                    received_amount: prepare.amount,
                    maximum_amount: max,
                };
                return Ok(reject(ErrorCode::F08_AMOUNT_TOO_LARGE, data.encode()));
            }
        }

        let Some(request) = crypto::decrypt(&self.secret, &prepare.data, self.cipher_mode)
            .ok()
            .and_then(|plaintext| StreamPacket::from_bytes(&plaintext).ok())
        else {
            return Ok(reject(ErrorCode::F06_UNEXPECTED_PAYMENT, Bytes::new()));
        };

        let received = self.rate.apply_floor(prepare.amount);
        let mut frames = vec![StreamFrame::asset_details(&self.denomination)];
        if self.close_connection {
            frames.push(StreamFrame::ConnectionClose {
                code: CloseCode::NoError,
                message: String::new(),
            });
        }

        let fulfillment = crypto::derive_fulfillment(&self.secret, &prepare.data);
        let fulfillable = crypto::condition_matches(&prepare.execution_condition, &fulfillment);
        if fulfillable {
            if let Some(code) = self.reject_payments_with {
                return Ok(reject(code, Bytes::new()));
            }
        }
        let packet_type = if fulfillable && received >= request.prepare_amount {
            StreamPacketType::Fulfill
        } else {
            StreamPacketType::Reject
        };
        let reply = StreamPacket {
            packet_type,
            sequence: request.sequence,
            prepare_amount: received,
            frames,
        };
        let data: Bytes = self.seal(&reply).into();

        match packet_type {
            StreamPacketType::Fulfill => {
                self.fulfilled.fetch_add(1, Ordering::SeqCst);
                self.total_received.fetch_add(received, Ordering::SeqCst);
                self.largest_fulfilled.fetch_max(prepare.amount, Ordering::SeqCst);
                Ok(IlpResponse::Fulfill(FulfillPacket { fulfillment, data }))
            }
            _ => Ok(reject(ErrorCode::F99_APPLICATION_ERROR, data)),
        }
    }

    pub fn seal(&self, packet: &StreamPacket) -> Vec<u8> {
        let plaintext = packet.to_bytes().expect("stream packets encode");
        crypto::encrypt(&self.secret, &plaintext, self.cipher_mode).expect("encryption succeeds")
    }
}

impl Link for SimulatedReceiver {
    fn send(&self, prepare: PreparePacket) -> BoxFuture<'_, Result<IlpResponse, LinkError>> {
        self.respond(prepare).boxed()
    }
}

pub(crate) fn reject(code: ErrorCode, data: Bytes) -> IlpResponse {
    IlpResponse::Reject(RejectPacket {
        code,
        triggered_by: Some(receiver_address()),
        message: String::new(),
        data,
    })
}
