//! Email one-time-code flow engine.

use std::sync::Arc;
use std::time::Duration;

use keybridge_core::{ApiClient, SessionManager};
use keybridge_popup::{EmailStep, PopupController, View};

use crate::error::FlowError;

/// How long the success view stays up before the popup auto-closes.
pub const SUCCESS_CLOSE_DELAY: Duration = Duration::from_millis(1000);

/// Advisory client-side cooldown between resend requests. UI convenience
/// only; the server enforces its own rate limits.
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(30);

/// Drives the email login and link flows.
///
/// Stateless between invocations; everything transient lives in the popup
/// controller.
pub struct EmailFlow {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
}

impl EmailFlow {
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        popup: Arc<PopupController>,
    ) -> Self {
        Self {
            api,
            session,
            popup,
        }
    }

    /// Request a login code and advance to the code-entry step.
    pub async fn send_code(&self, email: &str) {
        self.popup.set_linking(false);
        self.popup.set_email(email);
        match self.api.email_init(email).await {
            Ok(()) => {
                self.popup.start_resend_cooldown(RESEND_COOLDOWN);
                self.popup.set_view(View::Email(EmailStep::Code));
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Request a link-mode code for the authenticated account.
    pub async fn send_link_code(&self, email: &str) {
        self.popup.set_linking(true);
        self.popup.set_email(email);
        match self.api.email_init(email).await {
            Ok(()) => {
                self.popup.start_resend_cooldown(RESEND_COOLDOWN);
                self.popup.set_view(View::LinkEmail(EmailStep::Code));
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Re-send the code to the address already in transient state, gated by
    /// the advisory cooldown.
    pub async fn resend_code(&self) {
        if !self.popup.can_resend() {
            tracing::debug!("resend suppressed by cooldown");
            return;
        }
        let Some(email) = self.popup.email() else {
            tracing::warn!("resend requested with no address in state");
            return;
        };
        match self.api.email_init(&email).await {
            Ok(()) => self.popup.start_resend_cooldown(RESEND_COOLDOWN),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Verify a login code: exchange for a token pair, install the session,
    /// show success, and auto-close shortly after.
    pub async fn verify(&self, email: &str, code: &str) {
        self.popup.set_view(View::EmailVerifying);
        match self.try_verify(email, code).await {
            Ok(()) => self.succeed(),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative login variant: propagates instead of driving the popup.
    pub async fn try_verify(&self, email: &str, code: &str) -> Result<(), FlowError> {
        let pair = self.api.email_auth(email, code).await?;
        self.session.install_session(pair).await?;
        tracing::info!("email login complete");
        Ok(())
    }

    /// Confirm a link-mode code for the authenticated account.
    pub async fn confirm_link(&self, email: &str, code: &str) {
        self.popup.set_view(View::EmailVerifying);
        match self.try_confirm_link(email, code).await {
            Ok(()) => self.succeed(),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative link variant.
    pub async fn try_confirm_link(&self, email: &str, code: &str) -> Result<(), FlowError> {
        self.api.email_link(email, code).await?;
        self.session.update_user().await?;
        tracing::info!("email linked");
        Ok(())
    }

    /// Unlink the email credential and refresh the user snapshot.
    pub async fn try_unlink(&self) -> Result<(), FlowError> {
        self.api.email_unlink().await?;
        self.session.update_user().await?;
        Ok(())
    }

    fn succeed(&self) {
        self.popup.set_view(View::EmailSuccess);
        let popup = Arc::clone(&self.popup);
        tokio::spawn(async move {
            tokio::time::sleep(SUCCESS_CLOSE_DELAY).await;
            popup.close();
        });
    }

    fn fail(&self, e: FlowError) {
        tracing::warn!("email flow failed: {}", e);
        self.popup.set_error_message(e.user_message());
        self.popup.set_view(View::EmailError);
    }
}
