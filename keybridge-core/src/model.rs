//! Domain model types for keybridge.
//!
//! This module defines the types shared across the workspace:
//! - [`AuthStatus`] / [`SessionSnapshot`] - Derived authentication state
//! - [`User`] - Server-owned profile snapshot with linked-credential summaries
//! - [`OAuthProvider`] - The supported OAuth identity providers
//! - [`AuthEvent`] - Broadcast auth state changes
//!
//! The session itself (the access/refresh token pair) is not a standalone
//! type: the pair lives under the two well-known store keys and crosses the
//! wire as [`crate::api::TokenPair`], installed atomically by the session
//! cell.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No valid session is held.
    Unauthenticated,
    /// A non-expired access token is held (or a refresh just succeeded).
    Authenticated,
}

/// Snapshot of the authentication state exposed to the host.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Current derived status.
    pub status: AuthStatus,
    /// Whether the initial session resolution has completed. The UI must not
    /// render gated content before this is true.
    pub ready: bool,
    /// Cached user profile, present only while authenticated.
    pub user: Option<User>,
}

/// A linked email credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedEmail {
    pub address: String,
}

/// A linked wallet credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedWallet {
    pub address: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// A linked passkey credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedPasskey {
    pub credential_id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// A linked OAuth identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedOAuth {
    pub provider: OAuthProvider,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Summary of the user's multi-factor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MfaSummary {
    pub enabled: bool,
    #[serde(default)]
    pub method: Option<String>,
}

/// Server-owned profile snapshot.
///
/// Fetched after every successful authentication or linkage change; the
/// client never mutates it, only replaces the whole snapshot. Unknown server
/// fields are preserved in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<LinkedEmail>,
    #[serde(default)]
    pub wallets: Vec<LinkedWallet>,
    #[serde(default)]
    pub passkeys: Vec<LinkedPasskey>,
    #[serde(default)]
    pub oauth: Vec<LinkedOAuth>,
    #[serde(default)]
    pub mfa: Option<MfaSummary>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// Best available identifier for display and TOTP provisioning:
    /// email if present, else the first wallet address.
    pub fn best_identifier(&self) -> Option<&str> {
        self.email
            .as_ref()
            .map(|e| e.address.as_str())
            .or_else(|| self.wallets.first().map(|w| w.address.as_str()))
    }
}

/// The supported OAuth identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Discord,
    Github,
    X,
}

impl OAuthProvider {
    /// Provider id as used in backend paths and callback query params.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Discord => "discord",
            Self::Github => "github",
            Self::X => "x",
        }
    }

    /// All supported providers.
    pub fn all() -> [OAuthProvider; 4] {
        [Self::Google, Self::Discord, Self::Github, Self::X]
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "discord" => Ok(Self::Discord),
            "github" => Ok(Self::Github),
            "x" => Ok(Self::X),
            other => Err(UnknownProvider {
                id: other.to_string(),
            }),
        }
    }
}

/// Error for an unrecognized provider id.
#[derive(Debug, thiserror::Error)]
#[error("unknown OAuth provider: {id}")]
pub struct UnknownProvider {
    pub id: String,
}

/// Application configuration fetched from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name of the embedding application; used as the TOTP issuer.
    pub name: String,
}

/// Auth state change events broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session was installed after a successful login.
    SignedIn,
    /// The session was cleared (logout or failed refresh).
    SignedOut,
    /// The session pair was replaced by a refresh exchange.
    TokenRefreshed,
    /// The cached user profile was replaced.
    UserUpdated,
    /// A reactive refresh failed mid-request; the host should send the user
    /// to its login location.
    SessionExpired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn provider_roundtrip() {
        for provider in OAuthProvider::all() {
            let parsed = OAuthProvider::from_str(provider.as_str()).unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = OAuthProvider::from_str("myspace").unwrap_err();
        assert_eq!(err.id, "myspace");
    }

    #[test]
    fn provider_serde_is_lowercase() {
        let json = serde_json::to_string(&OAuthProvider::Github).unwrap();
        assert_eq!(json, "\"github\"");
    }

    #[test]
    fn best_identifier_prefers_email() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": { "address": "a@b.com" },
            "wallets": [{ "address": "0xabc" }],
        }))
        .unwrap();
        assert_eq!(user.best_identifier(), Some("a@b.com"));
    }

    #[test]
    fn best_identifier_falls_back_to_wallet() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "wallets": [{ "address": "0xabc" }, { "address": "0xdef" }],
        }))
        .unwrap();
        assert_eq!(user.best_identifier(), Some("0xabc"));
    }

    #[test]
    fn user_preserves_unknown_fields() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "avatar_url": "https://example.com/a.png",
        }))
        .unwrap();
        assert!(user.extra.contains_key("avatar_url"));
    }
}
