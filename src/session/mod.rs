//! Session manager: the single source of truth for "who is logged in".
//!
//! ARCHITECTURE
//! ============
//! `SessionManager` is an explicit state container handed to whatever needs
//! it; every transition is a named operation (validate, login, logout,
//! refresh, clear). State is published through a `watch` channel so UI code
//! can subscribe instead of polling.
//!
//! CONCURRENCY
//! ===========
//! Validation, polling, login and a 401 eviction from an unrelated request
//! can all be in flight at once. Two counters keep stale results out:
//! - `generation` is bumped by every clear and login; an async result is
//!   applied only if the generation captured at request start still matches.
//! - `validation_seq` orders validations; only the most recently started one
//!   may publish, so a later call always wins over an earlier one.

mod monitor;
mod types;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

pub use monitor::SessionMonitor;
pub use types::{
    AuthProvider, LoginResponse, ProfileDetails, RefreshResponse, Session, SessionStatus, User, ValidationResponse,
};

use crate::claims::{self, Claims};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::gateway::{EvictionHook, Gateway, RequestOptions};
use crate::network::NetworkMonitor;
use crate::storage::{Slot, TokenStore};
use types::{LoginRequest, backend_message};

pub const VALIDATE_PATH: &str = "/api/users/validate-token";
pub const LOGIN_PATH: &str = "/api/users/login";
pub const LOGOUT_PATH: &str = "/api/users/logout";
pub const REFRESH_PATH: &str = "/api/users/refresh-token";

#[must_use]
pub fn user_path(user_id: i64) -> String {
    format!("/api/users/{user_id}")
}

// =============================================================================
// SHARED STATE
// =============================================================================

/// State shared with the gateway's eviction path.
struct SessionShared {
    tx: watch::Sender<Session>,
    generation: AtomicU64,
    validation_seq: AtomicU64,
}

impl SessionShared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Wipe the published session and invalidate every in-flight result.
    fn reset(&self) {
        self.bump_generation();
        self.tx.send_replace(Session::anonymous());
    }

    fn mark_authenticating(&self) {
        self.tx.send_if_modified(|session| {
            if session.status == SessionStatus::Authenticating {
                false
            } else {
                session.status = SessionStatus::Authenticating;
                true
            }
        });
    }

    /// Undo `mark_authenticating` without touching the user.
    fn settle_authenticating(&self) {
        self.tx.send_if_modified(|session| {
            if session.status != SessionStatus::Authenticating {
                return false;
            }
            session.status =
                if session.user.is_some() { SessionStatus::Authenticated } else { SessionStatus::Anonymous };
            true
        });
    }
}

impl EvictionHook for SessionShared {
    fn on_session_evicted(&self) {
        self.reset();
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    gateway: Gateway,
    network: NetworkMonitor,
    shared: Arc<SessionShared>,
}

impl SessionManager {
    /// Create an anonymous session over `gateway` and register for its 401 evictions.
    #[must_use]
    pub fn new(config: SessionConfig, gateway: Gateway, network: NetworkMonitor) -> Self {
        let (tx, _rx) = watch::channel(Session::anonymous());
        let shared = Arc::new(SessionShared {
            tx,
            generation: AtomicU64::new(0),
            validation_seq: AtomicU64::new(0),
        });
        gateway.register_eviction_hook(shared.clone());
        Self { inner: Arc::new(SessionInner { config, gateway, network, shared }) }
    }

    /// Wire up store, gateway and network monitor from one config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn from_config(config: SessionConfig, store: TokenStore) -> Result<Self, SessionError> {
        let gateway = Gateway::new(&config, store)?;
        let network = NetworkMonitor::new(config.reconnect_window);
        Ok(Self::new(config, gateway, network))
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.shared.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.shared.tx.subscribe()
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn network(&self) -> &NetworkMonitor {
        &self.inner.network
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        self.inner.gateway.store()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Ask the backend who the stored credential belongs to.
    ///
    /// Any failure, including having no credential at all, leaves the session
    /// anonymous. Returns whether the backend confirmed the session.
    pub async fn bootstrap_validate(&self) -> bool {
        let shared = &self.inner.shared;
        let generation = shared.generation();
        let seq = shared.validation_seq.fetch_add(1, Ordering::SeqCst) + 1;

        if self.store().get_token().is_none() {
            tracing::debug!("no stored credential; session is anonymous");
            self.publish_validation(generation, seq, Session::anonymous());
            return false;
        }

        shared.mark_authenticating();
        let next = match self.inner.gateway.get_json::<ValidationResponse>(VALIDATE_PATH).await {
            Ok(response) => match response.into_user() {
                Some(user) => Session::authenticated(user),
                None => {
                    tracing::info!("backend reported credential as invalid");
                    Session::anonymous()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, code = e.error_code(), "session validation failed");
                Session::anonymous()
            }
        };
        let authenticated = next.is_authenticated();
        self.publish_validation(generation, seq, next) && authenticated
    }

    fn publish_validation(&self, generation: u64, seq: u64, next: Session) -> bool {
        let shared = &self.inner.shared;
        if !shared.is_current(generation) {
            tracing::debug!(generation, "dropping validation result from a cleared session");
            return false;
        }
        if shared.validation_seq.load(Ordering::SeqCst) != seq {
            tracing::debug!(seq, "dropping validation result superseded by a newer call");
            return false;
        }
        shared.tx.send_replace(next);
        true
    }

    /// Log in with email and password.
    ///
    /// On success the credential goes to the durable slot and the user is
    /// built straight from the login response, with no follow-up validation.
    ///
    /// # Errors
    ///
    /// `Authentication` with the backend's message when the login is
    /// rejected; `Network`/`Timeout` for transport failures. The session is
    /// left as it was on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let shared = &self.inner.shared;
        let generation = shared.generation();
        shared.mark_authenticating();

        let result = self.request_login(email, password).await;
        let stale = !shared.is_current(generation);
        let response = match result {
            Ok(_) if stale => {
                tracing::info!("login result dropped; session was cleared while it was in flight");
                return Err(SessionError::Authentication {
                    message: "login superseded by a newer session change".into(),
                });
            }
            Ok(response) => response,
            Err(e) => {
                if !stale {
                    shared.settle_authenticating();
                }
                return Err(e);
            }
        };

        let store = self.store();
        if let Err(e) = store.set_token(&response.token, Slot::Durable) {
            shared.settle_authenticating();
            return Err(e);
        }
        store.clear_hints();
        store.set_hints(&response.hints());

        let user = response.to_user(email);
        tracing::info!(user_id = user.id, provider = user.auth_provider.as_str(), "logged in");
        // Validations started before this login must not overwrite it.
        shared.bump_generation();
        shared.tx.send_replace(Session::authenticated(user.clone()));
        Ok(user)
    }

    async fn request_login(&self, email: &str, password: &str) -> Result<LoginResponse, SessionError> {
        let body = serde_json::to_value(LoginRequest { email, password })?;
        let options = RequestOptions::post().json(body).skip_auth();
        let response = self.inner.gateway.send(LOGIN_PATH, options).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = backend_message(status.as_u16(), &body);
            tracing::info!(status = status.as_u16(), %message, "login rejected");
            return Err(SessionError::Authentication { message });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Best-effort server-side logout followed by an unconditional local clear.
    pub async fn logout(&self) {
        match self.inner.gateway.send(LOGOUT_PATH, RequestOptions::post()).await {
            Ok(response) => tracing::debug!(status = response.status().as_u16(), "server logout"),
            Err(e) => tracing::debug!(error = %e, "server logout failed; clearing locally anyway"),
        }
        self.clear_session();
        self.store().clear_hints();
    }

    /// Synchronous, unconditional local wipe.
    pub fn clear_session(&self) {
        self.store().clear();
        self.inner.shared.reset();
        tracing::info!("session cleared");
    }

    /// Replace the session user with the full backend record. No-op unless authenticated.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures; only a 401 is destructive to the session.
    pub async fn refresh_user_data(&self) -> Result<(), SessionError> {
        let session = self.session();
        let Some(user_id) = session.user.as_ref().filter(|_| session.is_authenticated()).map(|u| u.id) else {
            return Ok(());
        };

        let shared = &self.inner.shared;
        let generation = shared.generation();
        let full: User = self.inner.gateway.get_json(&user_path(user_id)).await.map_err(|e| {
            tracing::warn!(user_id, error = %e, "failed to refresh user data");
            e
        })?;
        if !shared.is_current(generation) {
            return Ok(());
        }
        shared.tx.send_if_modified(|session| match &session.user {
            Some(current) if session.status == SessionStatus::Authenticated && current.id == full.id => {
                session.user = Some(full);
                true
            }
            _ => false,
        });
        Ok(())
    }

    /// Exchange the current credential for a fresh one and re-validate.
    ///
    /// The new credential goes into the slot the old one occupied. Returns
    /// `false` on any failure without touching the session.
    pub async fn refresh_token(&self) -> bool {
        let slot = self.store().token_slot().unwrap_or(Slot::Durable);
        let generation = self.inner.shared.generation();

        let response = match self
            .inner
            .gateway
            .fetch_json::<RefreshResponse>(REFRESH_PATH, RequestOptions::post())
            .await
        {
            Ok(response) if !response.token.is_empty() => response,
            Ok(_) => {
                tracing::warn!("refresh response carried an empty token");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                return false;
            }
        };
        if !self.inner.shared.is_current(generation) {
            return false;
        }
        if let Err(e) = self.store().set_token(&response.token, slot) {
            tracing::warn!(error = %e, "failed to store refreshed token");
            return false;
        }
        self.bootstrap_validate().await;
        true
    }

    /// Advisory claims of the stored credential.
    #[must_use]
    pub fn claims(&self) -> Option<Claims> {
        self.store().get_token().as_deref().and_then(Claims::decode)
    }

    /// Minutes until the stored credential's `exp`; 0 without a decodable credential.
    #[must_use]
    pub fn minutes_until_expiration(&self) -> i64 {
        self.store()
            .get_token()
            .map_or(0, |token| claims::minutes_until_expiration(&token, claims::now_millis()))
    }

    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.store()
            .get_token()
            .map_or(true, |token| claims::is_token_expired(&token, claims::now_millis()))
    }

    /// True when the credential expires within the configured warning window.
    #[must_use]
    pub fn should_warn_expiration(&self) -> bool {
        self.store().get_token().is_some_and(|token| {
            claims::should_warn_expiration(&token, claims::now_millis(), self.inner.config.expiry_warning_mins)
        })
    }
}
