//! Session error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! The gateway never swallows a failure: transport errors, timeouts and
//! authorization failures all surface as a `SessionError`. Only
//! `SessionExpired` is destructive to local session state; a network blip
//! must never log the user out.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors produced by the session core.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Invalid call into the gateway. Indicates a bug, not a user condition.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An authorized call was attempted with no stored credential.
    #[error("no authentication token available")]
    MissingToken,

    /// The backend answered 401; local session state has been cleared.
    #[error("session expired or token invalid")]
    SessionExpired,

    /// Login was rejected by the backend.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The HTTP request failed at the transport level.
    #[error("network request failed: {0}")]
    Network(String),

    /// The HTTP request exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The backend returned a non-success status to a typed helper.
    #[error("unexpected response status {status}")]
    Status { status: u16, body: String },

    /// A response body or credential could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A storage slot could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Stable machine-readable code for logs and UI mapping.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "E_CONFIGURATION",
            Self::MissingToken => "E_MISSING_TOKEN",
            Self::SessionExpired => "E_SESSION_EXPIRED",
            Self::Authentication { .. } => "E_AUTHENTICATION",
            Self::Network(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::Storage(_) => "E_STORAGE",
        }
    }

    /// Whether this failure wipes the local session.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Whether the UI should route the user to the login screen.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::MissingToken)
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
