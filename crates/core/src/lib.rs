//! Interledger STREAM sender.
//!
//! Splits a payment into many small ILP packets, encrypts every STREAM packet with the
//! shared secret, paces and sizes packets with a congestion controller and reconciles
//! the asynchronous fulfill/reject responses into an amount actually delivered.

/// Sender configuration, loaded from TOML.
pub mod config;

/// Congestion control bounding the value in flight on a connection.
pub mod congestion;

/// Per (destination, shared secret) session state and the connection registry.
pub mod connection;

/// Authenticated encryption of STREAM payloads and execution condition derivation.
pub mod crypto;

/// Aggregate error type of the public API.
pub mod error;

/// The ordered filter pipeline that decides what to send and interprets replies.
pub mod filter;

/// Abstraction over the link that carries ILP packets to the next hop.
pub mod link;

/// Tracing and logging initialization.
#[cfg(feature = "trace")]
pub mod logging;

/// Interledger Prepare/Fulfill/Reject packet model.
pub mod packet;

/// Exchange rate and path capacity probing.
pub mod probe;

/// The payment run loop.
pub mod sender;

/// STREAM packets and frames.
pub mod stream;

/// Shared state of one payment attempt (rates, capacity, amounts, failures).
pub mod tracker;

pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::config::SenderConfig;
pub use crate::connection::{ConnectionId, ConnectionRegistry, StreamConnection};
pub use crate::crypto::SharedSecret;
pub use crate::error::StreamError;
pub use crate::filter::SendState;
pub use crate::link::{Link, LinkError};
pub use crate::packet::InterledgerAddress;
pub use crate::probe::{ExchangeRateProber, ProbeOutcome};
pub use crate::sender::{
    PaymentOutcome, SendMoneyRequest, SendMoneyResult, SourceAccount, StreamSender,
};
