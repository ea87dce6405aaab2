//! # Keybridge Core
//!
//! Session lifecycle and backend plumbing for the keybridge authentication
//! orchestration layer.
//!
//! This crate provides:
//! - Domain types for sessions, users, and OAuth providers
//! - The persisted token store contract with in-memory and (optional)
//!   OS-keyring implementations
//! - The token claims codec and base64url helpers
//! - The backend API client with per-request decoration and the reactive
//!   401 refresh-once-then-retry policy
//! - The session token lifecycle manager (cold-start resolution, throttled
//!   proactive refresh, logout) and auth-state event broadcasting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keybridge_core::{
//!     ApiClient, MemoryStore, RequestContext, SessionCell, SessionConfig,
//!     SessionManager,
//! };
//!
//! let context = Arc::new(RequestContext::new("my-app"));
//! let cell = Arc::new(SessionCell::new(
//!     Arc::new(MemoryStore::new()),
//!     context,
//!     SessionConfig::default(),
//! ));
//! let api = Arc::new(ApiClient::new("https://auth.example.com", cell.clone())?);
//! let session = Arc::new(SessionManager::new(cell, api));
//!
//! session.resolve_initial_session().await;
//! assert!(session.cell().is_ready());
//! ```

pub mod api;
pub mod codec;
pub mod context;
pub mod error;
pub mod model;
pub mod session;
pub mod store;

// Re-export commonly used types at crate root
pub use api::{ApiClient, ApiError, MfaInitResponse, TokenPair, WalletChallenge};
pub use codec::{CodecError, b64url_decode, b64url_encode, decode_claims, token_expiry};
pub use context::RequestContext;
pub use error::KeybridgeError;
pub use model::{
    AppConfig,
    AuthEvent,
    AuthStatus,
    OAuthProvider,
    SessionSnapshot,
    User,
};
pub use session::{SessionCell, SessionConfig, SessionError, SessionManager, token_is_expired};
pub use store::{
    ACCESS_TOKEN_KEY,
    MemoryStore,
    RECENT_CONNECTOR_KEY,
    REFRESH_TOKEN_KEY,
    Secret,
    StoreError,
    TokenStore,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;
