//! Session state and backend wire DTOs.
//!
//! DESIGN
//! ======
//! Wire types mirror the backend's camelCase JSON. Backend records are
//! loosely typed (nulls where a default would do), so scalar fields go
//! through `null_as_default` instead of failing the whole decode.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::IdentityHints;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// AUTH PROVIDER
// =============================================================================

/// Identity provider that issued the session. Unknown tags fall back to `Local`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum AuthProvider {
    #[default]
    Local,
    Google,
}

impl From<String> for AuthProvider {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case("google") { Self::Google } else { Self::Local }
    }
}

impl AuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Google => "GOOGLE",
        }
    }
}

// =============================================================================
// USER
// =============================================================================

/// The logged-in user as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub admin: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auth_provider: AuthProvider,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_complete: bool,
    #[serde(default)]
    pub picture: Option<String>,
    /// Extended profile, present only after a full record fetch.
    #[serde(flatten)]
    pub profile: ProfileDetails,
}

/// Optional profile fields carried by the full `/api/users/{id}` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// ISO date string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rh: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikiloc: Option<String>,
    /// Stored file path of the insurance document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terrapirata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name).trim().to_owned(),
            None => self.first_name.clone(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Observable "who is logged in" state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<User>,
}

impl Session {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(user: User) -> Self {
        Self { status: SessionStatus::Authenticated, user: Some(user) }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.user.is_some()
    }

    /// True while a validate or login call is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Authenticating
    }
}

// =============================================================================
// WIRE DTOS
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /api/users/login` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub admin: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auth_provider: AuthProvider,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_complete: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl LoginResponse {
    /// Synthesize the session user; the login response carries no email, so
    /// the one the user typed is used.
    #[must_use]
    pub fn to_user(&self, email: &str) -> User {
        User {
            id: self.user_id,
            email: email.to_owned(),
            first_name: self.first_name.clone().unwrap_or_default(),
            last_name: None,
            admin: self.admin,
            auth_provider: self.auth_provider,
            profile_complete: self.profile_complete,
            picture: non_empty(self.picture.clone()),
            profile: ProfileDetails::default(),
        }
    }

    #[must_use]
    pub fn hints(&self) -> IdentityHints {
        IdentityHints {
            first_name: non_empty(self.first_name.clone()),
            picture: non_empty(self.picture.clone()),
            user_id: Some(self.user_id.to_string()),
            admin: Some(self.admin.to_string()),
        }
    }
}

/// `GET /api/users/validate-token` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub admin: Option<bool>,
    pub auth_provider: Option<AuthProvider>,
    pub profile_complete: Option<bool>,
    pub picture: Option<String>,
    pub message: Option<String>,
}

impl ValidationResponse {
    /// The authoritative user, or `None` when the backend says the token is
    /// invalid or omits the user id.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        if !self.valid {
            return None;
        }
        Some(User {
            id: self.user_id?,
            email: self.email.unwrap_or_default(),
            first_name: self.first_name.unwrap_or_default(),
            last_name: non_empty(self.last_name),
            admin: self.admin.unwrap_or(false),
            auth_provider: self.auth_provider.unwrap_or_default(),
            profile_complete: self.profile_complete.unwrap_or(false),
            picture: non_empty(self.picture),
            profile: ProfileDetails::default(),
        })
    }
}

/// `POST /api/users/refresh-token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// Error body shape used by the backend for rejected requests.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Best human-readable message from a rejected response body.
pub(crate) fn backend_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = non_empty(parsed.message).or_else(|| non_empty(parsed.error)) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        format!("login failed: {status}")
    } else {
        trimmed.to_owned()
    }
}
