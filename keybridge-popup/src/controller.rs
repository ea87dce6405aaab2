//! The popup controller: single owner of popup state.
//!
//! All view transitions go through exactly two mutation entry points,
//! [`set_view`](PopupController::set_view) and [`back`](PopupController::back),
//! plus [`open`]/[`close`] which manage visibility and enforce the reset
//! invariants:
//!
//! - opening any flow resets all transient state first (a new flow never
//!   layers atop a stale one);
//! - closing unconditionally returns to [`View::MethodSelect`] and clears
//!   every transient field, whatever view was active.
//!
//! [`open`]: PopupController::open
//! [`close`]: PopupController::close

use parking_lot::RwLock;
use std::time::{Duration, Instant};

use keybridge_core::{OAuthProvider, Secret};

use crate::state::{MfaSetup, OAuthErrorInfo, PopupState, Transient, WalletInfo};
use crate::view::{EmailStep, MfaStep, View};

/// Thread-safe owner of [`PopupState`].
///
/// The UI reads immutable snapshots; the flow engines and the facade write
/// through the narrow methods below.
#[derive(Default)]
pub struct PopupController {
    state: RwLock<PopupState>,
}

impl PopupController {
    /// Create a closed popup on the default view.
    pub fn new() -> Self {
        Self::default()
    }

    /// An owned copy of the current state for rendering.
    pub fn snapshot(&self) -> PopupState {
        self.state.read().clone()
    }

    /// Whether the popup is currently shown.
    pub fn is_open(&self) -> bool {
        self.state.read().show
    }

    /// The active view.
    pub fn view(&self) -> View {
        self.state.read().view
    }

    /// Open the popup on the given view, resetting all transient state first.
    pub fn open(&self, view: View) {
        let mut state = self.state.write();
        state.transient = Transient::default();
        state.view = view;
        state.show = true;
        tracing::debug!(?view, "popup opened");
    }

    /// Close the popup: hide, return to the default view, clear everything.
    pub fn close(&self) {
        let mut state = self.state.write();
        state.show = false;
        state.view = View::MethodSelect;
        state.transient = Transient::default();
        tracing::debug!("popup closed");
    }

    /// Jump to a view. The single forward-transition entry point.
    pub fn set_view(&self, view: View) {
        let mut state = self.state.write();
        tracing::debug!(from = ?state.view, to = ?view, "view transition");
        state.view = view;
    }

    /// Context-sensitive back navigation. The single backward-transition
    /// entry point.
    ///
    /// - wallet sub-views return to connector selection, resetting wallet
    ///   transient state;
    /// - the OAuth error view returns to method selection, resetting OAuth
    ///   transient state;
    /// - email code steps return to the corresponding input step, preserving
    ///   the typed address;
    /// - MFA steps walk back one sub-state;
    /// - everything else falls back to method selection.
    pub fn back(&self) {
        let mut state = self.state.write();
        let from = state.view;
        let next = match from {
            view if view.is_wallet_subview() => {
                state.transient.reset_wallet();
                View::WalletConnectorSelect
            }
            View::OAuthError => {
                state.transient.reset_oauth();
                View::MethodSelect
            }
            View::Email(EmailStep::Code) => View::Email(EmailStep::Input),
            View::LinkEmail(EmailStep::Code) => View::LinkEmail(EmailStep::Input),
            View::Mfa(step) => match step {
                MfaStep::Method => View::MethodSelect,
                MfaStep::Qr => View::Mfa(MfaStep::Method),
                MfaStep::Code => View::Mfa(MfaStep::Qr),
                MfaStep::Passkey => View::Mfa(MfaStep::Method),
                MfaStep::PasskeySuccess => View::Mfa(MfaStep::Passkey),
            },
            _ => View::MethodSelect,
        };
        tracing::debug!(?from, to = ?next, "back navigation");
        state.view = next;
    }

    // ── Transient field access ───────────────────────────────

    /// Record whether the platform authenticator is available; taken at
    /// popup-open time to gate the passkey method.
    pub fn set_passkey_available(&self, available: bool) {
        self.state.write().passkey_available = available;
    }

    pub fn set_email(&self, email: impl Into<String>) {
        self.state.write().transient.email = Some(email.into());
    }

    pub fn email(&self) -> Option<String> {
        self.state.read().transient.email.clone()
    }

    pub fn set_linking(&self, linking: bool) {
        self.state.write().transient.linking = linking;
    }

    pub fn is_linking(&self) -> bool {
        self.state.read().transient.linking
    }

    /// Start the advisory resend cooldown window.
    pub fn start_resend_cooldown(&self, cooldown: Duration) {
        self.state.write().transient.email_resend_at = Some(Instant::now() + cooldown);
    }

    /// Whether the advisory resend cooldown has elapsed. UI convenience only,
    /// not a security control.
    pub fn can_resend(&self) -> bool {
        match self.state.read().transient.email_resend_at {
            Some(at) => Instant::now() >= at,
            None => true,
        }
    }

    pub fn set_connector_id(&self, id: impl Into<String>) {
        self.state.write().transient.connector_id = Some(id.into());
    }

    pub fn connector_id(&self) -> Option<String> {
        self.state.read().transient.connector_id.clone()
    }

    pub fn set_connecting_wallet(&self, info: WalletInfo) {
        self.state.write().transient.connecting_wallet = Some(info);
    }

    pub fn set_wallet_uri(&self, uri: impl Into<String>) {
        self.state.write().transient.wallet_uri = Some(uri.into());
    }

    pub fn wallet_uri(&self) -> Option<String> {
        self.state.read().transient.wallet_uri.clone()
    }

    pub fn set_wallet_error(&self, message: impl Into<String>) {
        self.state.write().transient.wallet_error = Some(message.into());
    }

    pub fn set_oauth_provider(&self, provider: OAuthProvider) {
        self.state.write().transient.oauth_provider = Some(provider);
    }

    pub fn set_oauth_error(&self, error: OAuthErrorInfo) {
        self.state.write().transient.oauth_error = Some(error);
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        self.state.write().transient.error_message = Some(message.into());
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.read().transient.error_message.clone()
    }

    pub fn set_mfa_setup(&self, secret: Secret, provisioning_uri: impl Into<String>) {
        self.state.write().transient.mfa_setup = Some(MfaSetup {
            secret,
            provisioning_uri: provisioning_uri.into(),
        });
    }

    pub fn mfa_setup(&self) -> Option<MfaSetup> {
        self.state.read().transient.mfa_setup.clone()
    }

    /// Drop the TOTP enrollment material (on confirm success).
    pub fn clear_mfa_setup(&self) {
        self.state.write().transient.mfa_setup = None;
    }
}

impl std::fmt::Debug for PopupController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PopupController")
            .field("show", &state.show)
            .field("view", &state.view)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirty_controller(view: View) -> PopupController {
        let controller = PopupController::new();
        controller.open(view);
        controller.set_email("a@b.com");
        controller.set_linking(true);
        controller.set_connector_id("remote-signer");
        controller.set_connecting_wallet(WalletInfo {
            id: "remote-signer".into(),
            name: "Remote Signer".into(),
        });
        controller.set_wallet_uri("wc:pairing-uri");
        controller.set_wallet_error("user rejected");
        controller.set_oauth_provider(OAuthProvider::Discord);
        controller.set_oauth_error(OAuthErrorInfo {
            provider: Some(OAuthProvider::Discord),
            state: Some("s".into()),
            message: "denied".into(),
        });
        controller.set_error_message("boom");
        controller.set_mfa_setup(Secret::new("JBSWY3DP"), "otpauth://totp/x");
        controller
    }

    fn assert_transient_clear(transient: &Transient) {
        assert!(transient.email.is_none());
        assert!(!transient.linking);
        assert!(transient.email_resend_at.is_none());
        assert!(transient.connector_id.is_none());
        assert!(transient.connecting_wallet.is_none());
        assert!(transient.wallet_uri.is_none());
        assert!(transient.wallet_error.is_none());
        assert!(transient.oauth_provider.is_none());
        assert!(transient.oauth_error.is_none());
        assert!(transient.error_message.is_none());
        assert!(transient.mfa_setup.is_none());
    }

    #[test]
    fn close_resets_from_every_view() {
        // The reset invariant holds for the whole view set
        for view in View::all() {
            let controller = dirty_controller(view);
            controller.close();

            let state = controller.snapshot();
            assert!(!state.show, "from {:?}", view);
            assert_eq!(state.view, View::MethodSelect, "from {:?}", view);
            assert_transient_clear(&state.transient);

            // Reopening lands clean
            controller.open(View::MethodSelect);
            let state = controller.snapshot();
            assert!(state.show);
            assert_transient_clear(&state.transient);
        }
    }

    #[test]
    fn open_resets_before_starting_a_new_flow() {
        let controller = dirty_controller(View::WalletQr);
        controller.open(View::Email(EmailStep::Input));

        let state = controller.snapshot();
        assert_eq!(state.view, View::Email(EmailStep::Input));
        assert_transient_clear(&state.transient);
    }

    #[test]
    fn back_from_wallet_subviews_returns_to_connector_select() {
        for view in [
            View::WalletConnecting,
            View::WalletQr,
            View::WalletSigning,
            View::WalletVerifying,
            View::WalletError,
        ] {
            let controller = dirty_controller(view);
            controller.back();
            let state = controller.snapshot();
            assert_eq!(state.view, View::WalletConnectorSelect, "from {:?}", view);
            assert!(state.transient.connector_id.is_none());
            assert!(state.transient.wallet_uri.is_none());
            assert!(state.transient.wallet_error.is_none());
            // Non-wallet state survives
            assert_eq!(state.transient.email.as_deref(), Some("a@b.com"));
        }
    }

    #[test]
    fn back_from_oauth_error_resets_oauth_state() {
        let controller = dirty_controller(View::OAuthError);
        controller.back();
        let state = controller.snapshot();
        assert_eq!(state.view, View::MethodSelect);
        assert!(state.transient.oauth_provider.is_none());
        assert!(state.transient.oauth_error.is_none());
    }

    #[test]
    fn back_from_code_step_preserves_typed_address() {
        let controller = dirty_controller(View::Email(EmailStep::Code));
        controller.back();
        let state = controller.snapshot();
        assert_eq!(state.view, View::Email(EmailStep::Input));
        assert_eq!(state.transient.email.as_deref(), Some("a@b.com"));

        let controller = dirty_controller(View::LinkEmail(EmailStep::Code));
        controller.back();
        assert_eq!(controller.view(), View::LinkEmail(EmailStep::Input));
        assert_eq!(controller.email().as_deref(), Some("a@b.com"));
    }

    #[test]
    fn back_walks_mfa_steps() {
        let cases = [
            (MfaStep::Qr, View::Mfa(MfaStep::Method)),
            (MfaStep::Code, View::Mfa(MfaStep::Qr)),
            (MfaStep::Passkey, View::Mfa(MfaStep::Method)),
            (MfaStep::PasskeySuccess, View::Mfa(MfaStep::Passkey)),
            (MfaStep::Method, View::MethodSelect),
        ];
        for (step, expected) in cases {
            let controller = PopupController::new();
            controller.open(View::Mfa(step));
            controller.back();
            assert_eq!(controller.view(), expected, "from {:?}", step);
        }
    }

    #[test]
    fn back_falls_back_to_method_select() {
        for view in [
            View::EmailVerifying,
            View::EmailSuccess,
            View::EmailError,
            View::OAuthConnecting,
            View::OAuthResuming,
            View::WalletConnectorSelect,
            View::WalletSuccess,
            View::PasskeySigning,
            View::PasskeyError,
            View::MfaError,
            View::MethodSelect,
            View::Email(EmailStep::Input),
            View::LinkEmail(EmailStep::Input),
        ] {
            let controller = PopupController::new();
            controller.open(view);
            controller.back();
            assert_eq!(controller.view(), View::MethodSelect, "from {:?}", view);
        }
    }

    #[test]
    fn resend_cooldown_is_advisory_gate() {
        let controller = PopupController::new();
        assert!(controller.can_resend());
        controller.start_resend_cooldown(Duration::from_secs(30));
        assert!(!controller.can_resend());
        controller.start_resend_cooldown(Duration::from_secs(0));
        assert!(controller.can_resend());
    }

    #[test]
    fn mfa_setup_cleared_on_demand_and_on_close() {
        let controller = PopupController::new();
        controller.open(View::Mfa(MfaStep::Qr));
        controller.set_mfa_setup(Secret::new("JBSWY3DP"), "otpauth://totp/x");
        assert!(controller.mfa_setup().is_some());

        controller.clear_mfa_setup();
        assert!(controller.mfa_setup().is_none());

        controller.set_mfa_setup(Secret::new("JBSWY3DP"), "otpauth://totp/x");
        controller.close();
        assert!(controller.mfa_setup().is_none());
    }
}
