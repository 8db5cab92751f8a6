use serde::{Deserialize, Serialize};

use crate::packet::InterledgerAddress;

/// Reason attached to `ConnectionClose` and `StreamClose` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseCode {
    NoError,
    InternalError,
    EndpointBusy,
    FlowControlError,
    StreamIdError,
    StreamStateError,
    FrameFormatError,
    ProtocolViolation,
    ApplicationError,
}

/// Asset code and scale of one side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Denomination {
    pub asset_code: String,
    pub asset_scale: u8,
}

impl Denomination {
    pub fn new(asset_code: impl Into<String>, asset_scale: u8) -> Self {
        Self {
            asset_code: asset_code.into(),
            asset_scale,
        }
    }
}

impl std::fmt::Display for Denomination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (scale {})", self.asset_code, self.asset_scale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFrame {
    ConnectionClose {
        code: CloseCode,
        message: String,
    },
    ConnectionNewAddress {
        source_address: InterledgerAddress,
    },
    ConnectionAssetDetails {
        asset_code: String,
        asset_scale: u8,
    },
    StreamMoney {
        stream_id: u64,
        shares: u64,
    },
    StreamMaxMoney {
        stream_id: u64,
        receive_max: u64,
        total_received: u64,
    },
    StreamClose {
        stream_id: u64,
        code: CloseCode,
        message: String,
    },
}

impl StreamFrame {
    pub fn asset_details(denomination: &Denomination) -> Self {
        StreamFrame::ConnectionAssetDetails {
            asset_code: denomination.asset_code.clone(),
            asset_scale: denomination.asset_scale,
        }
    }
}
