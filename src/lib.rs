//! Client-side authentication session layer for the rally backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Sits between UI code and the backend's `/api/` surface. Owns the bearer
//! credential, decides whether the user is logged in, injects the credential
//! into outgoing requests, and resets everything when the backend rejects it.
//!
//! ARCHITECTURE
//! ============
//! - `storage`: durable/ephemeral credential slots plus identity hints.
//! - `network`: connectivity state with a short "reconnecting" pulse.
//! - `gateway`: authorized requests and 401 eviction.
//! - `session`: the observable session and its lifecycle operations.
//! - `oauth`: identity-provider redirect absorption.
//! - `claims`: local, unverified reads of the credential's payload.

pub mod claims;
pub mod config;
pub mod error;
pub mod gateway;
pub mod network;
pub mod oauth;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::SessionConfig;
pub use error::SessionError;
pub use gateway::{EvictionHook, Gateway, RequestOptions};
pub use network::{ConnectivitySignal, NetworkMonitor, NetworkState};
pub use oauth::{AbsorbOutcome, History, MemoryHistory, OAuth2CallbackAbsorber};
pub use session::{Session, SessionManager, SessionMonitor, SessionStatus, User};
pub use storage::{IdentityHints, Slot, TokenStore};
