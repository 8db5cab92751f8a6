use std::borrow::Cow;

use futures::future::BoxFuture;

use crate::packet::{IlpResponse, PreparePacket};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(Cow<'static, str>),
}

/// Carries ILP prepares to the next hop and returns its response.
///
/// A link is shared by all packets of all payments, so `send` may be called
/// concurrently. Implementations own the wire encoding and any reconnect logic.
pub trait Link: Send + Sync + 'static {
    fn send(&self, prepare: PreparePacket) -> BoxFuture<'_, Result<IlpResponse, LinkError>>;
}
