//! Slack request signature verification.
//!
//! Runs against the raw body bytes before anything is parsed: an
//! attacker-controlled payload is never deserialized until the signature
//! checks out.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Slack recommends rejecting requests older than five minutes.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request timestamp missing or malformed")]
    BadTimestamp,

    #[error("request timestamp outside tolerance window")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the expected `v0=` signature for a timestamp and raw body.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a claimed signature against the shared signing secret.
///
/// Rejects when the timestamp is non-numeric, when `|now - timestamp|`
/// exceeds `tolerance_secs` (replay guard), or when the recomputed digest
/// does not match. The digest comparison is constant-time.
pub fn verify_signature(
    secret: &str,
    signature: &str,
    timestamp: &str,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    // abs_diff: the header is attacker-controlled and may sit at the far
    // ends of the i64 range, where `(now - ts).abs()` would overflow.
    if now.abs_diff(ts) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = sign(secret, timestamp, body);
    if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
