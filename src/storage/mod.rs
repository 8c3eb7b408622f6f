//! Credential persistence across a durable and an ephemeral slot.
//!
//! DESIGN
//! ======
//! Both slots sit behind one `TokenStore` parameterized by `Slot`, so the
//! "at most one credential" invariant lives here instead of at every call
//! site: writing one slot always clears the other first.

mod backend;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

pub use backend::{FileBackend, MemoryBackend, SlotBackend};

use crate::error::SessionError;

const AUTH_TOKEN_KEY: &str = "auth_token";
const CACHED_USER_KEY: &str = "user";

const HINT_FIRST_NAME_KEY: &str = "firstName";
const HINT_PICTURE_KEY: &str = "userPicture";
const HINT_USER_ID_KEY: &str = "userId";
const HINT_ADMIN_KEY: &str = "isAdmin";

/// Persistence class for the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Survives a restart.
    Durable,
    /// Cleared when the session (tab/process) ends.
    Ephemeral,
}

impl Slot {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Durable => Self::Ephemeral,
            Self::Ephemeral => Self::Durable,
        }
    }
}

/// Display hints primed before the backend has confirmed the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHints {
    pub first_name: Option<String>,
    pub picture: Option<String>,
    pub user_id: Option<String>,
    pub admin: Option<String>,
}

impl IdentityHints {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.picture.is_none() && self.user_id.is_none() && self.admin.is_none()
    }
}

/// Shared handle over the two credential slots. Cloning shares the backends.
#[derive(Clone)]
pub struct TokenStore {
    durable: Arc<dyn SlotBackend>,
    ephemeral: Arc<dyn SlotBackend>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").field("slot", &self.token_slot()).finish_non_exhaustive()
    }
}

impl TokenStore {
    #[must_use]
    pub fn new(durable: Arc<dyn SlotBackend>, ephemeral: Arc<dyn SlotBackend>) -> Self {
        Self { durable, ephemeral }
    }

    /// Both slots in memory. Used by tests and short-lived tools.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), Arc::new(MemoryBackend::new()))
    }

    fn backend(&self, slot: Slot) -> &dyn SlotBackend {
        match slot {
            Slot::Durable => self.durable.as_ref(),
            Slot::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    /// Store `token` in `slot`, clearing the other slot first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if either slot cannot be written.
    pub fn set_token(&self, token: &str, slot: Slot) -> Result<(), SessionError> {
        self.backend(slot.other()).remove(AUTH_TOKEN_KEY)?;
        self.backend(slot).set(AUTH_TOKEN_KEY, token)?;
        tracing::debug!(?slot, "stored auth token");
        Ok(())
    }

    /// The durable credential if present, else the ephemeral one.
    #[must_use]
    pub fn get_token(&self) -> Option<String> {
        self.token_slot().and_then(|slot| self.read(slot, AUTH_TOKEN_KEY))
    }

    /// Which slot currently holds the credential.
    #[must_use]
    pub fn token_slot(&self) -> Option<Slot> {
        [Slot::Durable, Slot::Ephemeral]
            .into_iter()
            .find(|slot| self.read(*slot, AUTH_TOKEN_KEY).is_some())
    }

    /// Empty the credential and cached user in both slots. Never fails.
    pub fn clear(&self) {
        for slot in [Slot::Durable, Slot::Ephemeral] {
            for key in [AUTH_TOKEN_KEY, CACHED_USER_KEY] {
                if let Err(e) = self.backend(slot).remove(key) {
                    tracing::warn!(?slot, key, error = %e, "failed to clear storage key");
                }
            }
        }
    }

    /// Write every present hint into the durable slot. Absent hints are left alone.
    pub fn set_hints(&self, hints: &IdentityHints) {
        let pairs = [
            (HINT_FIRST_NAME_KEY, &hints.first_name),
            (HINT_PICTURE_KEY, &hints.picture),
            (HINT_USER_ID_KEY, &hints.user_id),
            (HINT_ADMIN_KEY, &hints.admin),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                if let Err(e) = self.durable.set(key, value) {
                    tracing::warn!(key, error = %e, "failed to store identity hint");
                }
            }
        }
    }

    #[must_use]
    pub fn hints(&self) -> IdentityHints {
        IdentityHints {
            first_name: self.read(Slot::Durable, HINT_FIRST_NAME_KEY),
            picture: self.read(Slot::Durable, HINT_PICTURE_KEY),
            user_id: self.read(Slot::Durable, HINT_USER_ID_KEY),
            admin: self.read(Slot::Durable, HINT_ADMIN_KEY),
        }
    }

    pub fn clear_hints(&self) {
        for key in [HINT_FIRST_NAME_KEY, HINT_PICTURE_KEY, HINT_USER_ID_KEY, HINT_ADMIN_KEY] {
            if let Err(e) = self.durable.remove(key) {
                tracing::warn!(key, error = %e, "failed to clear identity hint");
            }
        }
    }

    /// Non-empty value under `key`; read failures count as absent.
    fn read(&self, slot: Slot, key: &str) -> Option<String> {
        match self.backend(slot).get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(?slot, key, error = %e, "failed to read storage key");
                None
            }
        }
    }
}
