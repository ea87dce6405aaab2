//! Browser/wallet ceremony collaborator contracts.
//!
//! The engines never talk to a wallet extension or the platform WebAuthn API
//! directly; they drive these traits. Hosts wire in real implementations,
//! tests wire in fakes.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// How a wallet connector reaches the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// Browser-injected provider; prompts appear in the extension.
    DirectInjected,
    /// Remote signer paired over a relay; pairing starts from a QR-encoded URI.
    RemoteSigner,
}

impl ConnectorKind {
    /// Wire identifier sent with wallet auth/link requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectInjected => "injected",
            Self::RemoteSigner => "remote",
        }
    }
}

/// An account reported by a connected wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAccount {
    pub address: String,
    pub chain_id: u64,
}

/// Error from an external ceremony (wallet prompt, WebAuthn dialog).
///
/// Categories exist so the engines can show a friendlier message than the
/// raw provider error when the server supplied none.
#[derive(Debug, Clone, Error)]
pub enum CeremonyError {
    /// The user declined the prompt.
    #[error("request rejected by the user")]
    Rejected,

    /// The wallet or authenticator could not be found.
    #[error("wallet or authenticator not found")]
    NotFound,

    /// The ceremony timed out.
    #[error("ceremony timed out")]
    Timeout,

    /// A network-class failure inside the ceremony transport.
    #[error("ceremony network error")]
    Network,

    /// The platform does not support this ceremony.
    #[error("ceremony not supported on this platform")]
    Unavailable,

    /// Anything the categories above don't cover.
    #[error("{0}")]
    Other(String),
}

impl CeremonyError {
    /// User-facing message for this category. Used only when no
    /// server-supplied message exists.
    pub fn friendly_message(&self) -> &str {
        match self {
            Self::Rejected => "The request was declined.",
            Self::NotFound => "Wallet not found. Is it installed and unlocked?",
            Self::Timeout => "The request timed out. Please try again.",
            Self::Network => "A network error occurred. Please try again.",
            Self::Unavailable => "This sign-in method isn't available on this device.",
            Self::Other(message) => message,
        }
    }
}

/// A wallet connection mechanism (browser-injected or QR-paired remote).
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Stable connector id, also persisted as the most-recently-used marker.
    fn id(&self) -> &str;

    /// Human-readable connector name.
    fn name(&self) -> &str;

    /// Connection mechanism.
    fn kind(&self) -> ConnectorKind;

    /// Whether pairing requires rendering a QR code.
    fn requires_qr(&self) -> bool {
        self.kind() == ConnectorKind::RemoteSigner
    }

    /// Tear down any existing connection. Always called before `connect`.
    async fn disconnect(&self);

    /// Establish a connection and report the active account. This is a
    /// suspension point with no client-side timeout; it resolves or rejects
    /// at the wallet's pace.
    async fn connect(&self) -> Result<WalletAccount, CeremonyError>;

    /// Channel of pairing URIs. Providers are inconsistent about which of
    /// their event names carries the URI, so implementations subscribe to
    /// every candidate and forward whatever arrives.
    fn subscribe_pairing_uri(&self) -> mpsc::Receiver<String>;

    /// Polling fallback for providers that never emit a pairing event.
    async fn poll_pairing_uri(&self) -> Option<String>;

    /// Request a signature over the exact message text.
    async fn sign_message(&self, message: &str) -> Result<String, CeremonyError>;
}

/// The platform WebAuthn ceremony surface.
#[async_trait]
pub trait PasskeyCeremony: Send + Sync {
    /// Whether a platform authenticator is available. Probed at popup-open
    /// time; the passkey method is hidden when this is false.
    async fn is_available(&self) -> bool;

    /// Run the "get credential" (assertion) ceremony.
    async fn get(
        &self,
        options: crate::passkey::AssertionOptions,
    ) -> Result<crate::passkey::AssertionResponse, CeremonyError>;

    /// Run the "create credential" (registration) ceremony.
    async fn create(
        &self,
        options: crate::passkey::RegistrationOptions,
    ) -> Result<crate::passkey::RegistrationResponse, CeremonyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_kind_wire_ids() {
        assert_eq!(ConnectorKind::DirectInjected.as_str(), "injected");
        assert_eq!(ConnectorKind::RemoteSigner.as_str(), "remote");
    }

    #[test]
    fn friendly_messages_cover_categories() {
        assert!(CeremonyError::Rejected.friendly_message().contains("declined"));
        assert!(CeremonyError::NotFound.friendly_message().contains("not found"));
        assert!(CeremonyError::Timeout.friendly_message().contains("timed out"));
        assert_eq!(
            CeremonyError::Other("custom".into()).friendly_message(),
            "custom"
        );
    }
}
