//! The orchestration facade.
//!
//! [`Keybridge`] is the single integration surface the UI layer consumes:
//! authentication status, the current user, the popup controller, and every
//! per-method entry point. Popup-driving operations never propagate flow
//! failures (the engines catch and route them to the method's error view),
//! while the `*_now` imperative variants return `Result` for callers working
//! outside the popup.

use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

use keybridge_core::{
    ApiClient, AuthEvent, OAuthProvider, SessionManager, SessionSnapshot, User,
};
use keybridge_flows::{
    CallbackOutcome, CeremonyError, ConnectorEntry, EmailFlow, FlowError, OAuthFlow,
    PasskeyCeremony, PasskeyFlow, TotpFlow, WalletFlow,
};
use keybridge_popup::{EmailStep, PopupController, PopupState, View};

/// The composed authentication orchestrator.
pub struct Keybridge {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
    email: EmailFlow,
    oauth: OAuthFlow,
    wallet: WalletFlow,
    passkey: Option<PasskeyFlow>,
    totp: TotpFlow,
    passkey_ceremony: Option<Arc<dyn PasskeyCeremony>>,
}

impl Keybridge {
    /// Start building a facade for the given backend and app id.
    pub fn builder(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
    ) -> crate::builder::KeybridgeBuilder {
        crate::builder::KeybridgeBuilder::new(base_url, app_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        popup: Arc<PopupController>,
        email: EmailFlow,
        oauth: OAuthFlow,
        wallet: WalletFlow,
        passkey: Option<PasskeyFlow>,
        totp: TotpFlow,
        passkey_ceremony: Option<Arc<dyn PasskeyCeremony>>,
    ) -> Self {
        Self {
            api,
            session,
            popup,
            email,
            oauth,
            wallet,
            passkey,
            totp,
            passkey_ceremony,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Resolve the stored session on cold start. Always completes with
    /// [`is_ready`](Self::is_ready) true.
    pub async fn resolve_initial_session(&self) {
        self.session.resolve_initial_session().await;
    }

    /// Start the background proactive-refresh loop.
    pub fn start_auto_refresh(&self) {
        self.session.start_auto_refresh();
    }

    /// Stop the background proactive-refresh loop.
    pub fn stop_auto_refresh(&self) {
        self.session.stop_auto_refresh();
    }

    /// Explicit refresh; clears the session on failure.
    pub async fn refresh_session(&self) -> Result<(), keybridge_core::SessionError> {
        self.session.refresh_session().await
    }

    /// Feed tab-visibility changes into the throttled proactive check.
    pub async fn handle_visibility_change(&self, visible: bool) {
        self.session.handle_visibility_change(visible).await;
    }

    /// Log out: best-effort server revocation, unconditional local clear,
    /// and popup close.
    pub async fn logout(&self) {
        self.session.logout().await;
        self.popup.close();
    }

    // ── State ────────────────────────────────────────────────

    /// Whether initial session resolution has completed.
    pub fn is_ready(&self) -> bool {
        self.session.cell().is_ready()
    }

    /// Whether a valid session is held.
    pub fn is_authenticated(&self) -> bool {
        self.session.cell().is_authenticated()
    }

    /// The cached user profile.
    pub fn user(&self) -> Option<User> {
        self.session.cell().snapshot().user
    }

    /// Status, readiness, and user in one snapshot.
    pub fn session_snapshot(&self) -> SessionSnapshot {
        self.session.cell().snapshot()
    }

    /// Subscribe to auth state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.cell().subscribe()
    }

    /// Re-fetch the user profile.
    pub async fn update_user(&self) -> Result<User, keybridge_core::SessionError> {
        self.session.update_user().await
    }

    /// The popup controller, for rendering snapshots and user navigation.
    pub fn popup(&self) -> &Arc<PopupController> {
        &self.popup
    }

    /// Current popup state for rendering.
    pub fn popup_state(&self) -> PopupState {
        self.popup.snapshot()
    }

    // ── Popup control ────────────────────────────────────────

    /// Open the popup on method selection, probing passkey availability
    /// first so the view can gate the passkey method.
    pub async fn open_popup(&self) {
        let passkey_available = match &self.passkey_ceremony {
            Some(ceremony) => ceremony.is_available().await,
            None => false,
        };
        self.popup.set_passkey_available(passkey_available);
        self.popup.open(View::MethodSelect);
    }

    /// Close the popup, resetting every transient field.
    pub fn close_popup(&self) {
        self.popup.close();
    }

    /// Context-sensitive back navigation.
    pub fn popup_back(&self) {
        self.popup.back();
    }

    // ── Email ────────────────────────────────────────────────

    /// Show the email entry view for a fresh login.
    pub fn email_start(&self) {
        self.popup.set_linking(false);
        self.popup.set_view(View::Email(EmailStep::Input));
    }

    pub async fn email_send_code(&self, email: &str) {
        self.email.send_code(email).await;
    }

    pub async fn email_resend_code(&self) {
        self.email.resend_code().await;
    }

    pub async fn email_verify(&self, email: &str, code: &str) {
        self.email.verify(email, code).await;
    }

    pub async fn email_send_link_code(&self, email: &str) {
        self.email.send_link_code(email).await;
    }

    pub async fn email_confirm_link(&self, email: &str, code: &str) {
        self.email.confirm_link(email, code).await;
    }

    /// Imperative login with no popup involvement; propagates failures.
    pub async fn login_with_email_code_now(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), FlowError> {
        self.email.try_verify(email, code).await
    }

    pub async fn unlink_email(&self) -> Result<(), FlowError> {
        self.email.try_unlink().await
    }

    // ── OAuth ────────────────────────────────────────────────

    /// Begin an OAuth login. Returns the provider URL the host must
    /// navigate to; `None` means the error view is already showing.
    pub async fn oauth_login(&self, provider: OAuthProvider, return_url: &str) -> Option<Url> {
        self.oauth.begin(provider, return_url).await
    }

    /// Begin an OAuth link for the authenticated account.
    pub async fn oauth_link(&self, provider: OAuthProvider, return_url: &str) -> Option<Url> {
        self.oauth.begin_link(provider, return_url).await
    }

    /// Handle the page re-entering after a provider redirect. The host must
    /// install the returned sanitized URL with its history API.
    pub async fn handle_oauth_callback(&self, callback_url: &Url) -> CallbackOutcome {
        self.oauth.resume(callback_url).await
    }

    pub async fn unlink_oauth(&self, provider: OAuthProvider) -> Result<(), FlowError> {
        self.oauth.try_unlink(provider).await
    }

    // ── Wallet ───────────────────────────────────────────────

    /// Available connectors, most-recently-used first.
    pub async fn connectors(&self) -> Vec<ConnectorEntry> {
        self.wallet.connector_entries().await
    }

    pub async fn wallet_login(&self, connector_id: Option<&str>) {
        self.wallet.login(connector_id).await;
    }

    pub async fn wallet_link(&self, connector_id: Option<&str>) {
        self.wallet.link(connector_id).await;
    }

    /// Continue after the user picked a connector in the selection view.
    pub async fn wallet_choose_connector(&self, connector_id: &str) {
        self.wallet.choose_connector(connector_id).await;
    }

    pub async fn unlink_wallet(&self, address: &str) -> Result<(), FlowError> {
        self.wallet.try_unlink(address).await
    }

    // ── Passkey ──────────────────────────────────────────────

    pub async fn passkey_login(&self) {
        match &self.passkey {
            Some(flow) => flow.login().await,
            None => self.passkey_unavailable(),
        }
    }

    pub async fn passkey_link(&self) {
        match &self.passkey {
            Some(flow) => flow.link().await,
            None => self.passkey_unavailable(),
        }
    }

    pub async fn unlink_passkey(&self, credential_id: &str) -> Result<(), FlowError> {
        match &self.passkey {
            Some(flow) => flow.try_unlink(credential_id).await,
            None => Err(CeremonyError::Unavailable.into()),
        }
    }

    fn passkey_unavailable(&self) {
        tracing::warn!("passkey flow invoked without a ceremony collaborator");
        self.popup
            .set_error_message(CeremonyError::Unavailable.friendly_message());
        self.popup.set_view(View::PasskeyError);
    }

    // ── TOTP ─────────────────────────────────────────────────

    pub async fn mfa_setup(&self) {
        self.totp.setup().await;
    }

    pub async fn mfa_confirm(&self, code: &str) {
        self.totp.confirm(code).await;
    }

    pub async fn mfa_disable(&self, code: &str) {
        self.totp.disable(code).await;
    }

    // ── Backend passthrough ──────────────────────────────────

    /// The underlying API client, for app-config fetches and advanced use.
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// The session manager handle.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}

impl std::fmt::Debug for Keybridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keybridge")
            .field("authenticated", &self.is_authenticated())
            .field("ready", &self.is_ready())
            .field("popup", &self.popup)
            .finish()
    }
}
