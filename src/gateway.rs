//! Authorized request gateway: the single chokepoint for backend calls.
//!
//! ARCHITECTURE
//! ============
//! Every call is resolved against the configured backend origin and must use
//! an `/api/` path. Credential injection, the missing-token check and 401
//! eviction all happen here so callers never repeat them.
//!
//! ERROR HANDLING
//! ==============
//! Nothing is swallowed. Transport failures become `Network`/`Timeout`,
//! non-2xx responses are handed back untouched, and a 401 on an authorized
//! call clears storage, notifies eviction hooks and surfaces
//! `SessionExpired`. The request is never retried.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{API_PREFIX, SessionConfig};
use crate::error::SessionError;
use crate::storage::TokenStore;

/// Notified synchronously when a 401 evicts the session.
pub trait EvictionHook: Send + Sync {
    fn on_session_evicted(&self);
}

/// Per-call options and auth policy.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// Omit credential injection (login, public endpoints).
    pub skip_auth: bool,
    /// Whether a 401 evicts the session.
    pub retry_on_auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: Method::GET, body: None, headers: HeaderMap::new(), skip_auth: false, retry_on_auth: true }
    }
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn post() -> Self {
        Self { method: Method::POST, ..Self::default() }
    }

    #[must_use]
    pub fn method(method: Method) -> Self {
        Self { method, ..Self::default() }
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    #[must_use]
    pub fn without_auth_eviction(mut self) -> Self {
        self.retry_on_auth = false;
        self
    }
}

#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    backend_url: String,
    store: TokenStore,
    hooks: Mutex<Vec<Arc<dyn EvictionHook>>>,
}

impl Gateway {
    /// Build a gateway over `store` using the origin and timeouts in `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: &SessionConfig, store: TokenStore) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SessionError::Configuration(format!("http client build failed: {e}")))?;
        Ok(Self {
            inner: Arc::new(GatewayInner {
                client,
                backend_url: config.backend_url.clone(),
                store,
                hooks: Mutex::new(Vec::new()),
            }),
        })
    }

    #[must_use]
    pub fn backend_url(&self) -> &str {
        &self.inner.backend_url
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn register_eviction_hook(&self, hook: Arc<dyn EvictionHook>) {
        let mut hooks = self.inner.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.push(hook);
    }

    /// Absolute URL for an `/api/` path.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any path outside the API prefix.
    pub fn resolve(&self, path: &str) -> Result<String, SessionError> {
        if !path.starts_with(API_PREFIX) {
            return Err(SessionError::Configuration(format!(
                "gateway only accepts paths starting with {API_PREFIX}, got: {path}"
            )));
        }
        Ok(format!("{}{path}", self.inner.backend_url))
    }

    /// Issue a request and hand back the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// - `Configuration` for a path outside the API prefix.
    /// - `MissingToken` for an authorized call with no stored credential.
    /// - `SessionExpired` for a 401 when `retry_on_auth` is set.
    /// - `Network` / `Timeout` for transport failures.
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        let url = self.resolve(path)?;
        let RequestOptions { method, body, headers, skip_auth, retry_on_auth } = options;

        let mut request = self.inner.client.request(method.clone(), &url).headers(headers);
        if !skip_auth {
            let token = self.inner.store.get_token().ok_or(SessionError::MissingToken)?;
            request = request
                .bearer_auth(token)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(%method, %url, "gateway request");
        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, %url, error = %e, "gateway transport failure");
            SessionError::from(e)
        })?;
        let status = response.status();
        tracing::debug!(%method, %url, status = status.as_u16(), "gateway response");

        if status == StatusCode::UNAUTHORIZED && retry_on_auth && !skip_auth {
            self.evict();
            return Err(SessionError::SessionExpired);
        }
        Ok(response)
    }

    /// Issue a request and decode a 2xx JSON body.
    ///
    /// # Errors
    ///
    /// Everything `send` returns, plus `Status` for non-2xx responses and
    /// `Decode` for bodies that do not match `T`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, SessionError> {
        let response = self.send(path, options).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status { status: status.as_u16(), body });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Authorized `GET` decoding a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Gateway::fetch_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        self.fetch_json(path, RequestOptions::get()).await
    }

    /// Clear stored credentials and notify every registered hook.
    fn evict(&self) {
        tracing::warn!("backend rejected credential; evicting session");
        self.inner.store.clear();
        let hooks = self.inner.hooks.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for hook in hooks {
            hook.on_session_evicted();
        }
    }
}
