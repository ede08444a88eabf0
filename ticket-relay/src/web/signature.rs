//! Tito webhook signature verification.
//!
//! Tito signs each delivery with HMAC-SHA256 over the raw request body and
//! sends the base64 digest in the `Tito-Signature` header.
//! Reference: https://ti.to/docs/api/admin#webhooks-verifying-webhooks

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "tito-signature";

/// Compute the base64 HMAC-SHA256 of `body` under `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a Tito webhook signature.
///
/// The body must be the exact bytes received; re-serialised JSON will not
/// match.
///
/// # Returns
///
/// `true` only when the header is present and matches the expected digest.
pub fn verify_tito_signature(signature: Option<&str>, body: &[u8], secret: &str) -> bool {
    let signature = match signature.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => {
            warn!("tito_signature_missing");
            return false;
        }
    };

    if secret.is_empty() {
        warn!("tito_signature_no_secret");
        return false;
    }

    let Some(expected_signature) = sign_body(secret, body) else {
        warn!("tito_signature_invalid_key");
        return false;
    };

    // Constant-time comparison to prevent timing attacks
    let valid = constant_time_compare(&expected_signature, signature);

    if !valid {
        warn!(
            expected_length = expected_signature.len(),
            actual_length = signature.len(),
            body_length = body.len(),
            "tito_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
