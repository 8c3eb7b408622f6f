//! Shared helpers for unit tests: an in-process stub backend and token builder.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderName;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::Next;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;

/// Build an unsigned JWT-shaped token around `claims`.
pub fn make_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// One request observed by the stub backend.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

/// Axum router bound to an ephemeral localhost port; records every routed request.
pub struct StubBackend {
    pub url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    server: JoinHandle<()>,
}

impl StubBackend {
    pub async fn spawn(router: Router) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&hits);
        let app = router.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let recorder = Arc::clone(&recorder);
            async move {
                let hit = {
                    // Request is not Sync; keep this borrow out of the await below.
                    let header =
                        |name: HeaderName| req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
                    Hit {
                        method: req.method().to_string(),
                        path: req.uri().path().to_owned(),
                        authorization: header(AUTHORIZATION),
                        content_type: header(CONTENT_TYPE),
                    }
                };
                recorder.lock().unwrap().push(hit);
                next.run(req).await
            }
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url: format!("http://{addr}"), hits, server }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|h| h.path == path).count()
    }

    /// Default config pointed at this backend, with short test timeouts.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        }
        .with_backend_url(&self.url)
        .unwrap()
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// An origin with nothing listening on it.
pub async fn dead_origin() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
