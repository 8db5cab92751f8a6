use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PacketError;

/// Maximum length of an ILP address in bytes.
pub const MAX_ADDRESS_LENGTH: usize = 1023;

const SCHEMES: &[&str] = &[
    "g", "private", "example", "peer", "self", "test", "test1", "test2", "test3", "local",
];

/// A validated Interledger address, e.g. `g.us.bank.alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterledgerAddress(String);

impl InterledgerAddress {
    pub fn new(address: impl Into<String>) -> Result<Self, PacketError> {
        let address = address.into();
        validate(&address)?;
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The allocation scheme, i.e. the first segment.
    pub fn scheme(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Appends a segment, e.g. a connection tag.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, PacketError> {
        Self::new(format!("{}.{}", self.0, suffix))
    }
}

fn validate(address: &str) -> Result<(), PacketError> {
    let invalid = |reason: &'static str| PacketError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };
    if address.is_empty() || address.len() > MAX_ADDRESS_LENGTH {
        return Err(invalid("length must be between 1 and 1023 bytes"));
    }
    let mut segments = address.split('.');
    let scheme = segments.next().unwrap_or_default();
    if !SCHEMES.contains(&scheme) {
        return Err(invalid("unknown allocation scheme"));
    }
    let mut count = 0;
    for segment in segments {
        count += 1;
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'~' | b'-'))
        {
            return Err(invalid("segment contains an illegal character"));
        }
    }
    if count == 0 {
        return Err(invalid("address needs at least one segment after the scheme"));
    }
    Ok(())
}

impl FromStr for InterledgerAddress {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InterledgerAddress {
    type Error = PacketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InterledgerAddress> for String {
    fn from(address: InterledgerAddress) -> Self {
        address.0
    }
}

impl fmt::Display for InterledgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
