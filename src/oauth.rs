//! External identity provider handshake.
//!
//! The provider redirects back to the application root with the credential
//! and a few identity hints in the query string. The absorber persists the
//! credential, strips every callback parameter from the visible URL with a
//! history *replace* (a push would leave the credential in navigation
//! history), then asks the backend for the authoritative session.

#[cfg(test)]
#[path = "oauth_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use url::Url;

use crate::error::SessionError;
use crate::gateway::{Gateway, RequestOptions};
use crate::session::SessionManager;
use crate::storage::{IdentityHints, Slot};

pub const LOGIN_URL_PATH: &str = "/api/users/oauth2/login-url";
pub const GOOGLE_PROVIDER: &str = "google";

/// Every query parameter the provider redirect may carry.
pub const CALLBACK_PARAMS: [&str; 7] = ["token", "userId", "admin", "provider", "profileComplete", "firstName", "picture"];

// =============================================================================
// HISTORY
// =============================================================================

/// The browser's location bar. Only in-place replacement is exposed; the
/// callback URL must never become a navigation history entry.
pub trait History: Send + Sync {
    fn current_url(&self) -> Url;
    /// Swap the current entry in place.
    fn replace_url(&self, url: &Url);
}

/// In-process location, for tools and tests.
#[derive(Debug)]
pub struct MemoryHistory {
    current: Mutex<Url>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new(initial: Url) -> Self {
        Self { current: Mutex::new(initial) }
    }
}

impl History for MemoryHistory {
    fn current_url(&self) -> Url {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_url(&self, url: &Url) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = url.clone();
    }
}

// =============================================================================
// CALLBACK PARAMETERS
// =============================================================================

/// Parameters of a provider redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: String,
    pub provider: String,
    pub user_id: Option<String>,
    pub admin: Option<String>,
    pub first_name: Option<String>,
    pub picture: Option<String>,
}

impl CallbackParams {
    /// `Some` only when the URL carries a non-empty `token` and `provider=google`.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "token" => params.token = value,
                "provider" => params.provider = value,
                "userId" => params.user_id = Some(value),
                "admin" => params.admin = Some(value),
                "firstName" => params.first_name = Some(value),
                "picture" => params.picture = Some(value),
                _ => {}
            }
        }
        (!params.token.is_empty() && params.provider == GOOGLE_PROVIDER).then_some(params)
    }

    #[must_use]
    pub fn hints(&self) -> IdentityHints {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        IdentityHints {
            first_name: present(&self.first_name),
            picture: present(&self.picture),
            user_id: present(&self.user_id),
            admin: present(&self.admin),
        }
    }
}

/// `url` without any callback parameter; the query is dropped entirely when nothing else remains.
#[must_use]
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

// =============================================================================
// ABSORBER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsorbOutcome {
    /// The URL carried no provider callback.
    NotACallback,
    /// The callback was consumed; `authenticated` is the backend's verdict.
    Absorbed { authenticated: bool },
}

pub struct OAuth2CallbackAbsorber {
    session: SessionManager,
    history: Arc<dyn History>,
}

impl OAuth2CallbackAbsorber {
    #[must_use]
    pub fn new(session: SessionManager, history: Arc<dyn History>) -> Self {
        Self { session, history }
    }

    /// Consume provider callback parameters from the current URL, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the credential cannot be persisted; the URL
    /// is left untouched in that case.
    pub async fn absorb(&self) -> Result<AbsorbOutcome, SessionError> {
        let url = self.history.current_url();
        let Some(params) = CallbackParams::from_url(&url) else {
            return Ok(AbsorbOutcome::NotACallback);
        };
        tracing::info!(provider = %params.provider, "absorbing identity provider callback");

        let store = self.session.store();
        store.set_token(&params.token, Slot::Durable)?;
        store.set_hints(&params.hints());
        self.history.replace_url(&strip_callback_params(&url));

        let authenticated = self.session.bootstrap_validate().await;
        if !authenticated {
            tracing::warn!("backend did not confirm the provider credential");
        }
        Ok(AbsorbOutcome::Absorbed { authenticated })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginUrlResponse {
    login_url: String,
}

/// Ask the backend where to send the browser to start a Google login.
///
/// # Errors
///
/// Propagates gateway failures and non-2xx statuses.
pub async fn google_login_url(gateway: &Gateway) -> Result<String, SessionError> {
    let response: LoginUrlResponse = gateway
        .fetch_json(LOGIN_URL_PATH, RequestOptions::get().skip_auth())
        .await?;
    if response.login_url.starts_with("http://") || response.login_url.starts_with("https://") {
        Ok(response.login_url)
    } else {
        Ok(format!("{}{}", gateway.backend_url(), response.login_url))
    }
}
