//! Execution conditions for STREAM packets.
//!
//! The receiver can regenerate the fulfillment of any packet from the shared secret
//! and the encrypted payload, so the sender never has to transmit it.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::SharedSecret;

type HmacSha256 = Hmac<Sha256>;

const FULFILLMENT_GENERATION_STRING: &[u8] = b"ilp_stream_fulfillment";

/// Condition used by probe packets. Nobody knows a preimage of it, so a probe can
/// never be fulfilled and never moves value.
pub const UNFULFILLABLE_CONDITION: [u8; 32] = [0u8; 32];

pub(crate) fn hmac_sha256(key: &[u8], message: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(message);
    Zeroizing::new(mac.finalize().into_bytes().into())
}

pub fn derive_fulfillment(secret: &SharedSecret, data: &[u8]) -> [u8; 32] {
    let fulfillment_key = hmac_sha256(secret.as_bytes(), FULFILLMENT_GENERATION_STRING);
    *hmac_sha256(fulfillment_key.as_slice(), data)
}

pub fn fulfillment_to_condition(fulfillment: &[u8; 32]) -> [u8; 32] {
    Sha256::digest(fulfillment).into()
}

pub fn derive_condition(secret: &SharedSecret, data: &[u8]) -> [u8; 32] {
    fulfillment_to_condition(&derive_fulfillment(secret, data))
}

pub fn condition_matches(condition: &[u8; 32], fulfillment: &[u8; 32]) -> bool {
    fulfillment_to_condition(fulfillment)[..]
        .ct_eq(&condition[..])
        .into()
}
