//! Unverified JWT payload introspection.
//!
//! Signatures are never checked here; the backend remains the authority. These
//! helpers only read the `exp` claim so the client can decide when to refresh.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Value};

use crate::util::unix_timestamp_now;

/// base64url that accepts both padded and unpadded segments.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the claims segment of a `header.payload.signature` token.
///
/// Returns `None` for anything that is not exactly three segments with a
/// base64url JSON object in the middle.
pub fn decode_payload(token: &str) -> Option<Map<String, Value>> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return None;
    };

    let bytes = URL_SAFE_LENIENT.decode(payload).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// The numeric `exp` claim in epoch seconds, if present.
pub fn token_expiry(token: &str) -> Option<i64> {
    let claims = decode_payload(token)?;
    claim_as_seconds(claims.get("exp")?)
}

/// Whether the token is unusable at `now` (epoch seconds).
///
/// Empty tokens, undecodable tokens and tokens without a numeric `exp` count
/// as expired.
pub fn is_token_expired_at(token: &str, now: i64) -> bool {
    if token.trim().is_empty() {
        return true;
    }
    token_expiry(token).is_none_or(|exp| now >= exp)
}

pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, unix_timestamp_now())
}

#[allow(clippy::cast_possible_truncation)]
fn claim_as_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|exp| exp.is_finite()).map(|exp| exp.floor() as i64))
}
