//! Token claims decoding and base64url helpers.
//!
//! The access token is an opaque signed token whose middle segment carries a
//! JSON claims object. The client only reads the expiry claim; signature
//! verification is server-side. Decode failures are surfaced as
//! [`CodecError`] and treated as "expired" by the session layer.
//!
//! The base64url helpers implement RFC 4648 §5 with padding stripped on
//! encode and tolerated on decode. The WebAuthn engine depends on this being
//! exact in both directions: a loosely padded credential field fails
//! signature verification server-side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Error type for token decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The token does not have the expected three-segment structure.
    #[error("malformed token: expected 3 segments, got {segments}")]
    MalformedToken { segments: usize },

    /// The claims segment is not valid base64url.
    #[error("invalid base64url in claims segment: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The claims segment is not valid JSON.
    #[error("invalid claims JSON: {0}")]
    InvalidClaims(#[from] serde_json::Error),

    /// The expiry claim is missing or not a valid timestamp.
    #[error("missing or invalid expiry claim")]
    InvalidExpiry,
}

/// Claims read from an access token. Only the fields the client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

/// Decode the claims segment of a token without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Claims, CodecError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(CodecError::MalformedToken {
            segments: segments.len(),
        });
    }

    let payload = b64url_decode(segments[1])?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Read a token's expiry as a UTC timestamp.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, CodecError> {
    let claims = decode_claims(token)?;
    DateTime::from_timestamp(claims.exp, 0).ok_or(CodecError::InvalidExpiry)
}

/// Encode bytes as base64url with padding stripped.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url input, tolerating both padded and unpadded forms.
pub fn b64url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}
