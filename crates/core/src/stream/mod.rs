//! STREAM packets carried, encrypted, in the `data` field of ILP packets.

use serde::{Deserialize, Serialize};

mod frame;

pub use self::frame::{CloseCode, Denomination, StreamFrame};

/// The ILP packet type a STREAM packet travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamPacketType {
    Prepare,
    Fulfill,
    Reject,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed stream packet: {0}")]
    Malformed(#[from] bincode::Error),
}

/// A decrypted STREAM packet.
///
/// In a Prepare, `prepare_amount` is the minimum amount the receiver must get for the
/// packet to be fulfilled. In a Fulfill or Reject it is the amount the receiver says
/// it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPacket {
    pub packet_type: StreamPacketType,
    pub sequence: u64,
    pub prepare_amount: u64,
    pub frames: Vec<StreamFrame>,
}

impl StreamPacket {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn asset_details(&self) -> Option<Denomination> {
        self.frames.iter().find_map(|frame| match frame {
            StreamFrame::ConnectionAssetDetails {
                asset_code,
                asset_scale,
            } => Some(Denomination::new(asset_code.clone(), *asset_scale)),
            _ => None,
        })
    }

    pub fn connection_close(&self) -> Option<(CloseCode, &str)> {
        self.frames.iter().find_map(|frame| match frame {
            StreamFrame::ConnectionClose { code, message } => Some((*code, message.as_str())),
            _ => None,
        })
    }
}
