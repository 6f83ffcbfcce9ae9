//! Optional HMAC-SHA256 authentication of provider callbacks.
//!
//! When a webhook secret is configured, the callback body must carry a hex
//! encoded `HMAC-SHA256(secret, raw_body)` in the `x-webhook-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Constant-time check of `signature_hex` against the body.
pub fn verify(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
