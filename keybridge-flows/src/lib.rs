//! # Keybridge Flows
//!
//! The five credential flow engines: email one-time-code, OAuth redirect,
//! wallet/SIWE, passkey/WebAuthn, and TOTP multi-factor.
//!
//! Engines are stateless coordinators: they hold shared handles to the API
//! client, the session manager, and the popup controller, plus the ceremony
//! collaborators for wallet and passkey. Popup-driving operations catch their
//! own failures, set the method's error view, and return normally; `try_*`
//! variants propagate `Result` for imperative (no-UI) callers.

pub mod ceremony;
pub mod email;
pub mod error;
pub mod oauth;
pub mod passkey;
pub mod siwe;
pub mod totp;
pub mod wallet;

// Re-export commonly used types at crate root
pub use ceremony::{
    CeremonyError,
    ConnectorKind,
    PasskeyCeremony,
    WalletAccount,
    WalletConnector,
};
pub use email::EmailFlow;
pub use error::FlowError;
pub use oauth::{CallbackOutcome, CallbackResult, OAuthFlow};
pub use passkey::{
    AssertionOptions,
    AssertionResponse,
    PasskeyFlow,
    RegistrationOptions,
    RegistrationResponse,
    WebAuthnCredential,
};
pub use siwe::SiweMessage;
pub use totp::TotpFlow;
pub use wallet::{ConnectorEntry, WalletFlow};
