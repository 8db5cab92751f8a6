//! Interledger packet model.
//!
//! Only the fields the STREAM sender reads or writes are modelled. The binary OER
//! encoding of these packets belongs to the link implementation.

use bytes::Bytes;
use chrono::{DateTime, Utc};

mod address;
mod error_code;

pub use self::address::{InterledgerAddress, MAX_ADDRESS_LENGTH};
pub use self::error_code::{ErrorClass, ErrorCode};

/// Largest `data` payload an ILP packet may carry.
pub const MAX_DATA_SIZE: usize = 32767;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("invalid interledger address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },
    #[error("amount too large data must be 16 bytes, got {0}")]
    InvalidAmountTooLargeData(usize),
}

/// A conditional transfer proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparePacket {
    pub destination: InterledgerAddress,
    pub amount: u64,
    pub execution_condition: [u8; 32],
    pub expires_at: DateTime<Utc>,
    pub data: Bytes,
}

/// Proof that a prepare was honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillPacket {
    pub fulfillment: [u8; 32],
    pub data: Bytes,
}

/// Denial of a prepare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectPacket {
    pub code: ErrorCode,
    pub triggered_by: Option<InterledgerAddress>,
    pub message: String,
    pub data: Bytes,
}

/// Response to a [`PreparePacket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IlpResponse {
    Fulfill(FulfillPacket),
    Reject(RejectPacket),
}

/// Payload of an `F08 Amount Too Large` reject.
///
/// Both amounts are denominated in the units of the connector that rejected the
/// packet, which are usually not the sender's units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountTooLargeErrorData {
    pub received_amount: u64,
    pub maximum_amount: u64,
}

impl AmountTooLargeErrorData {
    pub const ENCODED_LEN: usize = 16;

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() != Self::ENCODED_LEN {
            return Err(PacketError::InvalidAmountTooLargeData(data.len()));
        }
        let mut received = [0u8; 8];
        let mut maximum = [0u8; 8];
        received.copy_from_slice(&data[..8]);
        maximum.copy_from_slice(&data[8..]);
        Ok(Self {
            received_amount: u64::from_be_bytes(received),
            maximum_amount: u64::from_be_bytes(maximum),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(Self::ENCODED_LEN);
        buf.extend_from_slice(&self.received_amount.to_be_bytes());
        buf.extend_from_slice(&self.maximum_amount.to_be_bytes());
        buf.into()
    }

    /// Largest source amount that would have fit, given `sent` source units produced
    /// `received_amount` at the rejecting connector.
    pub fn max_source_amount(&self, sent: u64) -> u64 {
        if self.received_amount == 0 {
            return sent.saturating_sub(1);
        }
        let scaled = sent as u128 * self.maximum_amount as u128 / self.received_amount as u128;
        u64::try_from(scaled).unwrap_or(u64::MAX).min(sent.saturating_sub(1))
    }
}

impl RejectPacket {
    pub fn is_amount_too_large(&self) -> bool {
        self.code == ErrorCode::F08_AMOUNT_TOO_LARGE
    }

    pub fn amount_too_large_data(&self) -> Option<AmountTooLargeErrorData> {
        if !self.is_amount_too_large() {
            return None;
        }
        AmountTooLargeErrorData::decode(&self.data).ok()
    }
}
