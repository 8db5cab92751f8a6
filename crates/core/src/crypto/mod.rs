//! Cryptography shared between sender and receiver of a STREAM connection.
//!
//! Every key is derived from the 32 byte shared secret agreed out of band (e.g. via
//! SPSP). Payload encryption lives in [`cipher`], execution conditions in
//! [`condition`].

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod cipher;
pub mod condition;

pub use self::cipher::{decrypt, encrypt, CipherMode, NONCE_SIZE, TAG_SIZE};
pub use self::condition::{
    condition_matches, derive_condition, derive_fulfillment, fulfillment_to_condition,
    UNFULFILLABLE_CONDITION,
};

pub const SHARED_SECRET_SIZE: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("failed to encrypt stream payload")]
    Encryption,
    /// Authentication failed, the input was truncated or the key was wrong.
    #[error("failed to decrypt stream payload")]
    Decryption,
    #[error("shared secret must be {SHARED_SECRET_SIZE} bytes, got {0}")]
    InvalidSecretLength(usize),
}

/// The 32 byte secret known only to sender and receiver.
///
/// Zeroed on drop; `Debug` never prints the key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn new(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SHARED_SECRET_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; SHARED_SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }

    /// Stable, non-reversible identifier of this secret.
    pub fn fingerprint(&self) -> [u8; 32] {
        *blake3::hash(&self.0).as_bytes()
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSecret").field(&"<redacted>").finish()
    }
}
