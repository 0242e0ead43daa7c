//! Unverified JWT claim inspection.
//!
//! Tokens are decoded only to read their expiry for session bookkeeping.
//! Signatures are never checked; the issuing server remains the authority on
//! whether a token is acceptable.

use authwire_config::constants::{JWT_EXPIRY_CLAIMS, JWT_RELATIVE_EXPIRY_THRESHOLD_SECS};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::auth::after;
use crate::error::{ClientError, Result};

/// Decode the claim set of `token` without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>> {
    let invalid = |reason: String| {
        tracing::debug!(%reason, "Failed to decode access token as JWT");
        ClientError::AuthorizationFailed(format!("unable to decode JWT access token: {reason}"))
    };

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid("expected three dot-separated segments".to_string()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| invalid(e.to_string()))?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(invalid("claims are not a JSON object".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Expiry instant carried by `token`, if any of the known claims is present.
///
/// Claims are searched in order (`exp`, `expiresIn`, `expires_in`,
/// `expires`); the first numeric one wins. Values below
/// [`JWT_RELATIVE_EXPIRY_THRESHOLD_SECS`] are lifetimes relative to `now`,
/// larger values are Unix timestamps.
pub fn jwt_expiry(token: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let claims = decode_claims(token)?;
    tracing::trace!(claims = ?claims.keys().collect::<Vec<_>>(), "Decoded JWT claims");

    let Some((claim, seconds)) = JWT_EXPIRY_CLAIMS
        .iter()
        .find_map(|name| claims.get(*name).and_then(numeric_claim).map(|v| (*name, v)))
    else {
        return Ok(None);
    };

    if seconds < JWT_RELATIVE_EXPIRY_THRESHOLD_SECS {
        return Ok(Some(after(now, seconds)));
    }

    DateTime::from_timestamp(seconds, 0).map(Some).ok_or_else(|| {
        ClientError::AuthorizationFailed(format!("JWT claim {claim} is out of range: {seconds}"))
    })
}

fn numeric_claim(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::Value;

    /// Sign `claims` with a throwaway HS256 key.
    pub(crate) fn token_with_claims(claims: &Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"not-the-server-key"),
        )
        .unwrap()
    }
}
