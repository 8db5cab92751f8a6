use crate::connection::ConnectionError;
use crate::crypto::CryptoError;
use crate::filter::ReplyError;
use crate::link::LinkError;
use crate::packet::PacketError;
use crate::stream::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
}
