//! # Keybridge
//!
//! Client-side authentication orchestration: six credential types (email
//! one-time-code, four OAuth providers, wallet signatures, WebAuthn
//! passkeys, TOTP multi-factor) behind one session model, driving a modal
//! popup through each method's multi-step flow.
//!
//! The [`Keybridge`] facade is the only surface the embedding UI consumes.
//! The backend REST API, wallet connectors, the WebAuthn platform API, QR
//! rendering, and device fingerprinting are collaborators wired in through
//! the builder.
//!
//! ```rust,ignore
//! use keybridge::Keybridge;
//!
//! let auth = Keybridge::builder("https://auth.example.com", "my-app-id")
//!     .app_url("https://app.example.com")
//!     .build()?;
//!
//! auth.resolve_initial_session().await;
//! auth.start_auto_refresh();
//!
//! auth.open_popup().await;
//! auth.email_send_code("a@b.com").await;
//! auth.email_verify("a@b.com", "123456").await;
//! assert!(auth.is_authenticated());
//! ```

pub mod builder;
pub mod facade;

pub use builder::KeybridgeBuilder;
pub use facade::Keybridge;

// Re-export the composed crates' surfaces
pub use keybridge_core::{
    ApiError,
    AppConfig,
    AuthEvent,
    AuthStatus,
    KeybridgeError,
    MemoryStore,
    OAuthProvider,
    Secret,
    SessionConfig,
    SessionError,
    SessionSnapshot,
    TokenStore,
    User,
};
#[cfg(feature = "keyring-store")]
pub use keybridge_core::KeyringStore;
pub use keybridge_flows::{
    CallbackOutcome,
    CallbackResult,
    CeremonyError,
    ConnectorEntry,
    ConnectorKind,
    FlowError,
    PasskeyCeremony,
    WalletAccount,
    WalletConnector,
};
pub use keybridge_popup::{EmailStep, MfaStep, PopupController, PopupState, View};
