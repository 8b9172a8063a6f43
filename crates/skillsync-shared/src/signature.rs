//! HMAC-SHA256 signatures for inbound webhooks.
//!
//! The sender computes `hex(HMAC-SHA256(secret, raw_body))` and places it in
//! the [`WEBHOOK_SIGNATURE_HEADER`](crate::constants::WEBHOOK_SIGNATURE_HEADER)
//! header, optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded signature of `body`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mac = keyed(secret, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify `signature_hex` against `body` in constant time.
pub fn verify_hmac_signature(
    secret: &[u8],
    body: &[u8],
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let signature_hex = signature_hex.trim();
    let signature_hex = signature_hex
        .strip_prefix("sha256=")
        .unwrap_or(signature_hex);

    let expected = hex::decode(signature_hex).map_err(|_| SignatureError::MalformedSignature)?;

    keyed(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

fn keyed(secret: &[u8], body: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    Ok(mac)
}
