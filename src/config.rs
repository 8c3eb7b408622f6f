//! Session configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

use crate::error::SessionError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const API_PREFIX: &str = "/api/";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_VALIDATE_INTERVAL_SECS: u64 = 5 * 60;
/// Floor for a hand-built `validate_interval`.
pub const MIN_VALIDATE_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_RECONNECT_WINDOW_MS: u64 = 2000;
pub const DEFAULT_EXPIRY_WARNING_MINS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend origin every `/api/` path is resolved against, without a trailing slash.
    pub backend_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Period of the background re-validation loop.
    pub validate_interval: Duration,
    /// How long `NetworkState::reconnecting` stays true after coming back online.
    pub reconnect_window: Duration,
    /// Remaining lifetime below which the credential is flagged as about to expire.
    pub expiry_warning_mins: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            validate_interval: Duration::from_secs(DEFAULT_VALIDATE_INTERVAL_SECS),
            reconnect_window: Duration::from_millis(DEFAULT_RECONNECT_WINDOW_MS),
            expiry_warning_mins: DEFAULT_EXPIRY_WARNING_MINS,
        }
    }
}

impl SessionConfig {
    /// Build typed session config from environment variables.
    ///
    /// Optional:
    /// - `RALLY_BACKEND_URL`: default `http://localhost:8080`
    /// - `RALLY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `RALLY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `RALLY_VALIDATE_INTERVAL_SECS`: default 300
    /// - `RALLY_RECONNECT_WINDOW_MS`: default 2000
    /// - `RALLY_EXPIRY_WARNING_MINS`: default 30
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the backend URL is not an absolute
    /// http(s) origin or the validate interval is zero.
    pub fn from_env() -> Result<Self, SessionError> {
        let backend_url = std::env::var("RALLY_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_owned());
        let validate_interval_secs = env_parse("RALLY_VALIDATE_INTERVAL_SECS", DEFAULT_VALIDATE_INTERVAL_SECS);
        if validate_interval_secs == 0 {
            return Err(SessionError::Configuration(
                "RALLY_VALIDATE_INTERVAL_SECS must be greater than zero".into(),
            ));
        }
        Ok(Self {
            backend_url: normalize_backend_url(&backend_url)?,
            request_timeout: Duration::from_secs(env_parse("RALLY_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse("RALLY_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            validate_interval: Duration::from_secs(validate_interval_secs),
            reconnect_window: Duration::from_millis(env_parse("RALLY_RECONNECT_WINDOW_MS", DEFAULT_RECONNECT_WINDOW_MS)),
            expiry_warning_mins: env_parse("RALLY_EXPIRY_WARNING_MINS", DEFAULT_EXPIRY_WARNING_MINS),
        })
    }

    /// Replace the backend origin, validating it the same way `from_env` does.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `url` is not an absolute http(s) origin.
    pub fn with_backend_url(mut self, url: &str) -> Result<Self, SessionError> {
        self.backend_url = normalize_backend_url(url)?;
        Ok(self)
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn normalize_backend_url(raw: &str) -> Result<String, SessionError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| SessionError::Configuration(format!("invalid backend url '{trimmed}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SessionError::Configuration(format!(
            "backend url must be http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_owned())
}
