//! The closed set of popup views.
//!
//! Every state the popup can render is a [`View`] variant. The email and MFA
//! methods carry their multi-step progression as explicit step sub-states so
//! back-navigation can walk them without string matching.

/// Step sub-state for the email method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStep {
    /// Entering the email address.
    Input,
    /// Entering the one-time code.
    Code,
}

/// Step sub-state for the TOTP multi-factor method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaStep {
    /// Choosing between available second factors.
    Method,
    /// Scanning the provisioning QR code.
    Qr,
    /// Entering the 6-digit code.
    Code,
    /// Passkey-as-second-factor prompt.
    Passkey,
    /// Passkey second factor confirmed.
    PasskeySuccess,
}

/// A view the popup can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The default method-selection view.
    MethodSelect,

    // Email login
    Email(EmailStep),
    EmailVerifying,
    EmailSuccess,
    EmailError,

    // Email link-to-account
    LinkEmail(EmailStep),

    // OAuth
    OAuthConnecting,
    /// Re-entered after the provider redirect; exchanging the callback code.
    OAuthResuming,
    OAuthError,

    // Wallet
    WalletConnectorSelect,
    WalletConnecting,
    WalletQr,
    WalletSigning,
    WalletVerifying,
    WalletSuccess,
    WalletError,

    // Passkey
    PasskeySigning,
    PasskeyVerifying,
    PasskeySuccess,
    PasskeyError,

    // TOTP multi-factor
    Mfa(MfaStep),
    MfaError,
}

impl Default for View {
    fn default() -> Self {
        Self::MethodSelect
    }
}

impl View {
    /// Whether this view belongs to the wallet flow's mid-ceremony group
    /// (back-navigation returns to connector selection from these).
    pub fn is_wallet_subview(&self) -> bool {
        matches!(
            self,
            Self::WalletConnecting
                | Self::WalletQr
                | Self::WalletSigning
                | Self::WalletVerifying
                | Self::WalletError
        )
    }

    /// Every view, with step sub-states expanded. Used to exercise
    /// whole-machine invariants in tests.
    pub fn all() -> Vec<View> {
        let mut views = vec![
            Self::MethodSelect,
            Self::EmailVerifying,
            Self::EmailSuccess,
            Self::EmailError,
            Self::OAuthConnecting,
            Self::OAuthResuming,
            Self::OAuthError,
            Self::WalletConnectorSelect,
            Self::WalletConnecting,
            Self::WalletQr,
            Self::WalletSigning,
            Self::WalletVerifying,
            Self::WalletSuccess,
            Self::WalletError,
            Self::PasskeySigning,
            Self::PasskeyVerifying,
            Self::PasskeySuccess,
            Self::PasskeyError,
            Self::MfaError,
        ];
        for step in [EmailStep::Input, EmailStep::Code] {
            views.push(Self::Email(step));
            views.push(Self::LinkEmail(step));
        }
        for step in [
            MfaStep::Method,
            MfaStep::Qr,
            MfaStep::Code,
            MfaStep::Passkey,
            MfaStep::PasskeySuccess,
        ] {
            views.push(Self::Mfa(step));
        }
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_method_select() {
        assert_eq!(View::default(), View::MethodSelect);
    }

    #[test]
    fn all_has_no_duplicates() {
        let views = View::all();
        for (i, a) in views.iter().enumerate() {
            for b in views.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn wallet_subview_grouping() {
        assert!(View::WalletQr.is_wallet_subview());
        assert!(View::WalletError.is_wallet_subview());
        assert!(!View::WalletConnectorSelect.is_wallet_subview());
        assert!(!View::WalletSuccess.is_wallet_subview());
    }
}
