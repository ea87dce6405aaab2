//! TOTP multi-factor flow engine.

use std::sync::Arc;

use keybridge_core::{ApiClient, Secret, SessionManager};
use keybridge_popup::{MfaStep, PopupController, View};

use crate::error::FlowError;

/// Account label used when the user has neither an email nor a wallet.
const FALLBACK_ACCOUNT: &str = "account";

/// Drives TOTP enrollment, confirmation, and disablement.
pub struct TotpFlow {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
}

impl TotpFlow {
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

    /// Begin enrollment: fetch the shared secret, derive the provisioning
    /// URI, stash both for the QR view.
    pub async fn setup(&self) {
        match self.try_setup().await {
            Ok(()) => self.popup.set_view(View::Mfa(MfaStep::Qr)),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative enrollment variant.
    pub async fn try_setup(&self) -> Result<(), FlowError> {
        let init = self.api.mfa_init().await?;

        // Prefer a provider-supplied URI; synthesize one otherwise.
        let uri = match init.uri.as_deref().and_then(extract_otpauth_uri) {
            Some(uri) => uri,
            None => {
                let issuer = self.api.app_config().await?.name;
                let account = self.account_label();
                provisioning_uri(&init.secret, &issuer, &account)
            }
        };

        self.popup.set_mfa_setup(Secret::new(init.secret), uri);
        Ok(())
    }

    /// Confirm enrollment with a 6-digit code. Clears the setup secret from
    /// memory on success.
    pub async fn confirm(&self, code: &str) {
        match self.try_confirm(code).await {
            Ok(()) => self.popup.set_view(View::Mfa(MfaStep::Method)),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative confirmation variant.
    pub async fn try_confirm(&self, code: &str) -> Result<(), FlowError> {
        self.api.mfa_link(code).await?;
        self.popup.clear_mfa_setup();
        self.session.update_user().await?;
        tracing::info!("totp factor enabled");
        Ok(())
    }

    /// Disable the factor with a 6-digit code.
    pub async fn disable(&self, code: &str) {
        match self.try_disable(code).await {
            Ok(()) => self.popup.set_view(View::Mfa(MfaStep::Method)),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative disable variant.
    pub async fn try_disable(&self, code: &str) -> Result<(), FlowError> {
        self.api.mfa_unlink(code).await?;
        self.session.update_user().await?;
        tracing::info!("totp factor disabled");
        Ok(())
    }

    /// Best available account label: email, else first wallet address, else
    /// a literal fallback.
    fn account_label(&self) -> String {
        self.session
            .cell()
            .snapshot()
            .user
            .as_ref()
            .and_then(|u| u.best_identifier().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_ACCOUNT.to_string())
    }

    fn fail(&self, e: FlowError) {
        tracing::warn!("totp flow failed: {}", e);
        self.popup.set_error_message(e.user_message());
        self.popup.set_view(View::MfaError);
    }
}

/// Pull an embedded `otpauth://` URI out of a provider payload, which may
/// wrap it in a larger string.
fn extract_otpauth_uri(raw: &str) -> Option<String> {
    raw.find("otpauth://").map(|start| raw[start..].to_string())
}

/// Synthesize a provisioning URI from the shared secret.
///
/// Format: `otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}`
/// with issuer and account percent-encoded.
fn provisioning_uri(secret: &str, issuer: &str, account: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer_q}",
        issuer = percent_encode(issuer),
        account = percent_encode(account),
        secret = secret,
        issuer_q = percent_encode(issuer),
    )
}

/// RFC 3986 percent-encoding of everything outside the unreserved set.
/// Authenticator apps expect %20 for spaces, not form-encoded '+'.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
