use std::fmt;

use serde::{Deserialize, Serialize};

/// Family of an ILP error code, given by its first letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// `F`: retrying the same packet will not help.
    Final,
    /// `T`: the packet may succeed if retried later.
    Temporary,
    /// `R`: the packet failed because of its own parameters, e.g. it expired.
    Relative,
    Unknown,
}

/// A three character ILP error code such as `F08`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode([u8; 3]);

impl ErrorCode {
    pub const F00_BAD_REQUEST: Self = Self(*b"F00");
    pub const F01_INVALID_PACKET: Self = Self(*b"F01");
    pub const F02_UNREACHABLE: Self = Self(*b"F02");
    pub const F03_INVALID_AMOUNT: Self = Self(*b"F03");
    pub const F04_INSUFFICIENT_DESTINATION_AMOUNT: Self = Self(*b"F04");
    pub const F05_WRONG_CONDITION: Self = Self(*b"F05");
    pub const F06_UNEXPECTED_PAYMENT: Self = Self(*b"F06");
    pub const F07_CANNOT_RECEIVE: Self = Self(*b"F07");
    pub const F08_AMOUNT_TOO_LARGE: Self = Self(*b"F08");
    pub const F99_APPLICATION_ERROR: Self = Self(*b"F99");
    pub const T00_INTERNAL_ERROR: Self = Self(*b"T00");
    pub const T01_PEER_UNREACHABLE: Self = Self(*b"T01");
    pub const T02_PEER_BUSY: Self = Self(*b"T02");
    pub const T03_CONNECTOR_BUSY: Self = Self(*b"T03");
    pub const T04_INSUFFICIENT_LIQUIDITY: Self = Self(*b"T04");
    pub const T05_RATE_LIMITED: Self = Self(*b"T05");
    pub const T99_APPLICATION_ERROR: Self = Self(*b"T99");
    pub const R00_TRANSFER_TIMED_OUT: Self = Self(*b"R00");
    pub const R01_INSUFFICIENT_SOURCE_AMOUNT: Self = Self(*b"R01");
    pub const R02_INSUFFICIENT_TIMEOUT: Self = Self(*b"R02");
    pub const R99_APPLICATION_ERROR: Self = Self(*b"R99");

    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub fn class(&self) -> ErrorClass {
        match self.0[0] {
            b'F' => ErrorClass::Final,
            b'T' => ErrorClass::Temporary,
            b'R' => ErrorClass::Relative,
            _ => ErrorClass::Unknown,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCode({self})")
    }
}
