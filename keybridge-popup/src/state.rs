//! Popup state and transient per-flow fields.

use std::time::Instant;

use keybridge_core::{OAuthProvider, Secret};

use crate::view::View;

/// Descriptor of the wallet being connected, for the connecting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub id: String,
    pub name: String,
}

/// Error carried back from an OAuth provider redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthErrorInfo {
    /// The provider, when the callback identified one.
    pub provider: Option<OAuthProvider>,
    /// The opaque state parameter, if present.
    pub state: Option<String>,
    pub message: String,
}

/// TOTP enrollment material held between `setup` and `confirm`.
///
/// Cleared on confirm success and, like all transient state, on popup close.
#[derive(Debug, Clone)]
pub struct MfaSetup {
    pub secret: Secret,
    /// `otpauth://` URI handed to the QR renderer.
    pub provisioning_uri: String,
}

/// Per-flow transient state, owned by the view state machine.
///
/// Fully reset whenever the popup closes and before any new flow starts, so
/// no stale connector, provider, or error leaks into the next flow.
#[derive(Debug, Clone, Default)]
pub struct Transient {
    /// Address typed into the email views; preserved across the code step.
    pub email: Option<String>,
    /// Whether the active flow links to an existing account (vs. fresh login).
    pub linking: bool,
    /// Advisory client-side cooldown gate for resending the email code.
    pub email_resend_at: Option<Instant>,
    /// Id of the chosen wallet connector.
    pub connector_id: Option<String>,
    /// Descriptor of the wallet currently connecting.
    pub connecting_wallet: Option<WalletInfo>,
    /// Pairing URI captured for QR rendering.
    pub wallet_uri: Option<String>,
    /// Last wallet ceremony error, already made user-friendly.
    pub wallet_error: Option<String>,
    /// Provider of the in-flight OAuth flow.
    pub oauth_provider: Option<OAuthProvider>,
    /// Error carried back from an OAuth callback.
    pub oauth_error: Option<OAuthErrorInfo>,
    /// Generic error message for the active method's error view.
    pub error_message: Option<String>,
    /// TOTP enrollment material.
    pub mfa_setup: Option<MfaSetup>,
}

impl Transient {
    /// Clear the wallet-flow fields (leaving other methods' state alone).
    pub fn reset_wallet(&mut self) {
        self.connector_id = None;
        self.connecting_wallet = None;
        self.wallet_uri = None;
        self.wallet_error = None;
    }

    /// Clear the OAuth-flow fields.
    pub fn reset_oauth(&mut self) {
        self.oauth_provider = None;
        self.oauth_error = None;
    }
}

/// The full popup state the UI layer reads.
#[derive(Debug, Clone, Default)]
pub struct PopupState {
    /// Whether the popup is shown.
    pub show: bool,
    /// The active view.
    pub view: View,
    /// Result of the platform authenticator availability probe, taken at
    /// popup-open time; gates the passkey method.
    pub passkey_available: bool,
    /// Per-flow transient fields.
    pub transient: Transient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_closed_on_method_select() {
        let state = PopupState::default();
        assert!(!state.show);
        assert_eq!(state.view, View::MethodSelect);
        assert!(state.transient.email.is_none());
        assert!(!state.transient.linking);
    }

    #[test]
    fn reset_wallet_leaves_other_fields() {
        let mut transient = Transient {
            email: Some("a@b.com".into()),
            connector_id: Some("injected".into()),
            wallet_uri: Some("wc:pair".into()),
            wallet_error: Some("rejected".into()),
            ..Default::default()
        };
        transient.reset_wallet();
        assert!(transient.connector_id.is_none());
        assert!(transient.wallet_uri.is_none());
        assert!(transient.wallet_error.is_none());
        assert_eq!(transient.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn reset_oauth_leaves_other_fields() {
        let mut transient = Transient {
            oauth_provider: Some(OAuthProvider::Google),
            oauth_error: Some(OAuthErrorInfo {
                provider: None,
                state: None,
                message: "denied".into(),
            }),
            connector_id: Some("injected".into()),
            ..Default::default()
        };
        transient.reset_oauth();
        assert!(transient.oauth_provider.is_none());
        assert!(transient.oauth_error.is_none());
        assert_eq!(transient.connector_id.as_deref(), Some("injected"));
    }
}
