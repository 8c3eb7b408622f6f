//! Client-side decode of bearer credential claims.
//!
//! DESIGN
//! ======
//! The payload segment of the JWT is decoded but never verified. Claims are a
//! display-hint cache only; nothing security-relevant is gated on them
//! without a backend round trip.
//!
//! Every claim decodes independently. A claim with an unexpected type reads
//! as absent instead of failing the whole payload, so a stray string `userId`
//! never hides a well-formed `exp`.

#[cfg(test)]
#[path = "claims_test.rs"]
mod tests;

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::session::AuthProvider;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Advisory claims embedded in the bearer credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Claims {
    /// Subject, usually the user's email.
    #[serde(deserialize_with = "lenient")]
    pub sub: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub admin: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub auth_provider: Option<AuthProvider>,
    #[serde(deserialize_with = "lenient")]
    pub profile_complete: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub picture: Option<String>,
    /// Expiration instant in whole seconds since the Unix epoch.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
}

/// Any value that does not fit `T` reads as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Numeric ids, also when the issuer sent them as strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// RFC 7519 NumericDate: integral or fractional seconds, floored.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Number(n) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)))
}

impl Claims {
    /// Decode the payload segment of `token`. Returns `None` for anything that
    /// is not a three-part token with a base64url JSON object in the middle.
    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Expiration as milliseconds since the epoch, or 0 when absent.
    #[must_use]
    pub fn expires_at_millis(&self) -> i64 {
        self.exp.map_or(0, |exp| exp.saturating_mul(1000))
    }

    /// Whole minutes left until `exp`, floored. Negative once expired.
    #[must_use]
    pub fn minutes_until_expiration_at(&self, now_millis: i64) -> i64 {
        match self.exp {
            Some(_) => self.expires_at_millis().saturating_sub(now_millis).div_euclid(MILLIS_PER_MINUTE),
            None => 0,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.exp {
            Some(_) => now_millis > self.expires_at_millis(),
            None => true,
        }
    }
}

/// Minutes until the token's `exp`, or 0 when the token is undecodable or has no `exp`.
#[must_use]
pub fn minutes_until_expiration(token: &str, now_millis: i64) -> i64 {
    Claims::decode(token).map_or(0, |claims| claims.minutes_until_expiration_at(now_millis))
}

/// Undecodable tokens and tokens without `exp` count as expired.
#[must_use]
pub fn is_token_expired(token: &str, now_millis: i64) -> bool {
    Claims::decode(token).map_or(true, |claims| claims.is_expired_at(now_millis))
}

/// True when the token expires within `threshold_mins` (and is still decodable).
#[must_use]
pub fn should_warn_expiration(token: &str, now_millis: i64, threshold_mins: i64) -> bool {
    let Some(claims) = Claims::decode(token) else {
        return false;
    };
    let expires_at = claims.expires_at_millis();
    expires_at > 0 && expires_at.saturating_sub(now_millis) < threshold_mins.saturating_mul(MILLIS_PER_MINUTE)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
