//! Persisted token storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`TokenStore`] - Trait for key-value storage backends
//! - [`MemoryStore`] - In-memory implementation for testing and ephemeral sessions
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//!
//! # Storage Keys
//!
//! The session layer uses a fixed, well-known key set:
//! - [`ACCESS_TOKEN_KEY`] / [`REFRESH_TOKEN_KEY`] - the current session pair;
//!   absence of either means "no session"
//! - [`RECENT_CONNECTOR_KEY`] - id of the most recently used wallet connector,
//!   read back to sort the connector list
//!
//! # Example
//!
//! ```rust,ignore
//! use keybridge_core::store::{Secret, TokenStore, MemoryStore, ACCESS_TOKEN_KEY};
//!
//! let store = MemoryStore::new();
//! store.set(ACCESS_TOKEN_KEY, &Secret::new("opaque-token")).await.unwrap();
//! let token = store.get(ACCESS_TOKEN_KEY).await.unwrap();
//! assert_eq!(token.unwrap().expose(), "opaque-token");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// Storage key for the current access token.
pub const ACCESS_TOKEN_KEY: &str = "keybridge/access_token";

/// Storage key for the current refresh token.
pub const REFRESH_TOKEN_KEY: &str = "keybridge/refresh_token";

/// Storage key for the most recently used wallet connector id.
pub const RECENT_CONNECTOR_KEY: &str = "keybridge/recent_connector";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the backing string is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the stored value was denied.
    #[error("access denied to key: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over the persisted key-value store holding the session pair.
///
/// In a browser embedding this is backed by the page's persistent key-value
/// storage; native embeddings can use [`KeyringStore`] (with the
/// `keyring-store` feature) or [`MemoryStore`] for ephemeral sessions.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a value at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, value: &Secret) -> Result<(), StoreError>;

    /// Delete a value by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }
}
