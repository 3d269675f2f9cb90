//! Expiry inspection for bearer tokens.
//!
//! Only the `exp` claim of the payload segment is read. The signature is
//! never verified; that is the server's job.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value;

/// Decode the `exp` claim (unix seconds) of a JWT-shaped token.
///
/// Returns `None` when the token is not three dot-separated segments, the
/// payload is not base64 JSON, or the claim is missing or non-numeric.
pub fn expires_at(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _sig) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_f64().map(|exp| exp as i64)
}

/// True iff the token's `exp` lies strictly after `now` (unix seconds).
pub fn is_token_valid_at(token: &str, now: i64) -> bool {
    expires_at(token).is_some_and(|exp| exp > now)
}

/// True iff the token's `exp` lies in the future.
pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, chrono::Utc::now().timestamp())
}

#[cfg(test)]
pub(crate) fn make_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
