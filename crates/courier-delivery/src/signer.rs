//! Payload signing for the delivery wire protocol.
//!
//! Signatures are HMAC-SHA256 over a canonical JSON encoding of the
//! payload, rendered as lowercase hex. Receivers recompute the signature
//! over the same canonical form using the shared secret, so the canonical
//! bytes are the contract: object keys sorted lexicographically, compact
//! separators, recursively applied. The wire body itself may differ in
//! whitespace or key order without breaking verification.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The payload could not be encoded as JSON.
    #[error("payload cannot be encoded: {0}")]
    Encoding(String),

    /// The secret was rejected as an HMAC key.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Serializes a payload into its canonical byte representation.
///
/// Object keys are sorted lexicographically at every nesting level and the
/// output uses compact separators, giving a single deterministic byte
/// sequence regardless of field insertion order. The sort is done
/// explicitly rather than relying on map implementation details.
///
/// # Errors
///
/// Returns `SignerError::Encoding` if a scalar cannot be serialized.
pub fn canonical_json(payload: &Value) -> Result<Vec<u8>, SignerError> {
    let mut out = Vec::new();
    write_canonical(payload, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), SignerError> {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                let encoded_key = serde_json::to_vec(key)
                    .map_err(|e| SignerError::Encoding(e.to_string()))?;
                out.extend_from_slice(&encoded_key);
                out.push(b':');
                write_canonical(value, out)?;
            }
            out.push(b'}');
        },
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        },
        scalar => {
            let encoded =
                serde_json::to_vec(scalar).map_err(|e| SignerError::Encoding(e.to_string()))?;
            out.extend_from_slice(&encoded);
        },
    }

    Ok(())
}

/// Computes the signature for a payload under the given secret.
///
/// Pure function: HMAC-SHA256 over the canonical bytes, lowercase hex.
///
/// # Errors
///
/// Returns `SignerError::Encoding` if the payload cannot be canonicalized.
pub fn sign(payload: &Value, secret: &str) -> Result<String, SignerError> {
    let canonical = canonical_json(payload)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignerError::InvalidKey)?;
    mac.update(&canonical);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a signature against a payload and secret.
///
/// Recomputes the expected signature and compares in constant time, so
/// receivers reusing this logic do not leak signature prefixes through
/// timing.
///
/// # Errors
///
/// Returns `SignerError::Encoding` if the payload cannot be canonicalized.
pub fn verify(payload: &Value, signature: &str, secret: &str) -> Result<bool, SignerError> {
    let expected = sign(payload, secret)?;
    Ok(constant_time_eq(signature, &expected))
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }

    diff == 0
}
