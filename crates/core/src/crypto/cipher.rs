//! AES-256-GCM encryption of STREAM packets.
//!
//! The key is `HMAC-SHA256(shared_secret, "ilp_stream_encryption")` and every message
//! gets a fresh random 12 byte nonce.
//!
//! ## Tag placement
//!
//! Two layouts of the encrypted message circulate between implementations:
//! `nonce | tag | ciphertext` (what the STREAM RFC describes) and
//! `nonce | ciphertext | tag` (the natural output of most AEAD libraries). Encryption
//! uses the configured [`CipherMode`]. Decryption tries the configured layout first and
//! falls back to the other one. This is an interoperability wart: a successful
//! decryption says nothing about which layout the peer used.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::condition::hmac_sha256;
use super::{CryptoError, SharedSecret};

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

const ENCRYPTION_KEY_STRING: &[u8] = b"ilp_stream_encryption";

/// Byte layout of an encrypted STREAM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherMode {
    #[default]
    NonceTagCiphertext,
    NonceCiphertextTag,
}

impl CipherMode {
    fn other(self) -> Self {
        match self {
            CipherMode::NonceTagCiphertext => CipherMode::NonceCiphertextTag,
            CipherMode::NonceCiphertextTag => CipherMode::NonceTagCiphertext,
        }
    }
}

fn cipher_for(secret: &SharedSecret) -> Aes256Gcm {
    let key: Zeroizing<[u8; 32]> = hmac_sha256(secret.as_bytes(), ENCRYPTION_KEY_STRING);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()))
}

pub fn encrypt(
    secret: &SharedSecret,
    plaintext: &[u8],
    mode: CipherMode,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(secret);

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &[], &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;

    let mut message = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len());
    message.extend_from_slice(&nonce);
    match mode {
        CipherMode::NonceTagCiphertext => {
            message.extend_from_slice(tag.as_slice());
            message.extend_from_slice(&buffer);
        }
        CipherMode::NonceCiphertextTag => {
            message.extend_from_slice(&buffer);
            message.extend_from_slice(tag.as_slice());
        }
    }

    nonce.zeroize();
    buffer.zeroize();
    Ok(message)
}

pub fn decrypt(
    secret: &SharedSecret,
    message: &[u8],
    mode: CipherMode,
) -> Result<Vec<u8>, CryptoError> {
    if message.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption);
    }
    let cipher = cipher_for(secret);
    open(&cipher, message, mode)
        .or_else(|_| {
            tracing::trace!(?mode, "decryption failed, retrying with the other tag placement");
            open(&cipher, message, mode.other())
        })
        .map_err(|_| CryptoError::Decryption)
}

fn open(cipher: &Aes256Gcm, message: &[u8], mode: CipherMode) -> Result<Vec<u8>, aes_gcm::Error> {
    let (nonce, rest) = message.split_at(NONCE_SIZE);
    let (tag, ciphertext) = match mode {
        CipherMode::NonceTagCiphertext => rest.split_at(TAG_SIZE),
        CipherMode::NonceCiphertextTag => {
            let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);
            (tag, ciphertext)
        }
    };

    let mut buffer = ciphertext.to_vec();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(nonce),
        &[],
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(err) => {
            buffer.zeroize();
            Err(err)
        }
    }
}
