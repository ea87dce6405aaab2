//! OAuth redirect flow engine.
//!
//! OAuth is the one flow that crosses a full-page navigation: `begin`
//! returns the provider URL the host must navigate to (in-memory state does
//! not survive the unload), and `resume` re-enters the flow from the
//! callback URL the page comes back with. `resume` always hands back a
//! scrubbed URL the host should install with its history API so the code and
//! error parameters never survive a reload or share.

use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use keybridge_core::{ApiClient, OAuthProvider, SessionManager};
use keybridge_popup::{OAuthErrorInfo, PopupController, View};

use crate::error::FlowError;

/// Callback query parameters consumed (and scrubbed) by this engine.
const CALLBACK_PARAMS: [&str; 4] = ["code", "state", "error", "provider"];

/// Outcome of re-entering the page after a provider redirect.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// The page URL with the callback parameters removed. The host must
    /// replace the visible URL with this before doing anything else.
    pub sanitized_url: Url,
    pub result: CallbackResult,
}

/// What the callback contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// No OAuth parameters present; this was a normal page load.
    NotACallback,
    /// A code was exchanged and the session installed.
    LoggedIn,
    /// The provider carried back an error, or the exchange failed.
    Failed(OAuthErrorInfo),
}

/// Drives the OAuth login and link flows.
pub struct OAuthFlow {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
}

impl OAuthFlow {
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

    /// Start a login: ask the backend for the provider redirect URL, passing
    /// the current page as the return target. Returns the URL for the host
    /// to navigate to, or `None` if the request failed (the error view is
    /// already showing).
    pub async fn begin(&self, provider: OAuthProvider, return_url: &str) -> Option<Url> {
        self.start(provider, return_url, false).await
    }

    /// Start a link: identical to login except the redirect target signals
    /// link-mode server-side.
    pub async fn begin_link(&self, provider: OAuthProvider, return_url: &str) -> Option<Url> {
        self.start(provider, return_url, true).await
    }

    async fn start(
        &self,
        provider: OAuthProvider,
        return_url: &str,
        linking: bool,
    ) -> Option<Url> {
        self.popup.set_linking(linking);
        self.popup.set_oauth_provider(provider);
        self.popup.set_view(View::OAuthConnecting);
        match self.api.oauth_init(provider, return_url).await {
            Ok(url) => Some(url),
            Err(e) => {
                self.fail(Some(provider), None, FlowError::from(e));
                None
            }
        }
    }

    /// Re-enter the flow from the callback URL on mount.
    ///
    /// If a code is present it is exchanged for a token pair; if only an
    /// error is present it is surfaced (provider `unknown` when the callback
    /// did not name one) and no exchange is ever attempted.
    pub async fn resume(&self, callback_url: &Url) -> CallbackOutcome {
        let params: HashMap<String, String> = callback_url
            .query_pairs()
            .filter(|(k, _)| CALLBACK_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if !params.contains_key("code") && !params.contains_key("error") {
            return CallbackOutcome {
                sanitized_url: callback_url.clone(),
                result: CallbackResult::NotACallback,
            };
        }

        // Scrub first: the code must not survive a reload or a shared link.
        let sanitized_url = scrub_callback_params(callback_url);
        let provider = params
            .get("provider")
            .and_then(|p| p.parse::<OAuthProvider>().ok());
        let state = params.get("state").cloned();

        let result = match (params.get("code"), provider) {
            (Some(code), Some(provider)) => {
                self.popup.open(View::OAuthResuming);
                self.popup.set_oauth_provider(provider);
                match self.try_exchange(provider, code).await {
                    Ok(()) => {
                        self.popup.close();
                        CallbackResult::LoggedIn
                    }
                    Err(e) => {
                        CallbackResult::Failed(self.fail(Some(provider), state, e))
                    }
                }
            }
            (Some(_), None) => {
                // A code we cannot attribute to a provider is unusable.
                self.popup.open(View::OAuthError);
                CallbackResult::Failed(self.fail(
                    None,
                    state,
                    FlowError::InvalidPayload("callback did not name a provider".into()),
                ))
            }
            (None, provider) => {
                let message = params
                    .get("error")
                    .cloned()
                    .unwrap_or_else(|| "authorization failed".to_string());
                self.popup.open(View::OAuthError);
                let info = OAuthErrorInfo {
                    provider,
                    state,
                    message,
                };
                self.popup.set_oauth_error(info.clone());
                CallbackResult::Failed(info)
            }
        };

        CallbackOutcome {
            sanitized_url,
            result,
        }
    }

    /// Imperative exchange: trades the callback code for a token pair and
    /// installs the session.
    ///
    /// Link-mode is indistinguishable here: the redirect target signaled it
    /// server-side, memory did not survive the navigation, and the user
    /// fetch that follows installation picks up the new linkage either way.
    pub async fn try_exchange(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<(), FlowError> {
        let pair = self.api.oauth_exchange(provider, code).await?;
        self.session.install_session(pair).await?;
        tracing::info!(%provider, "oauth exchange complete");
        Ok(())
    }

    /// Unlink an OAuth identity and refresh the user snapshot.
    pub async fn try_unlink(&self, provider: OAuthProvider) -> Result<(), FlowError> {
        self.api.oauth_unlink(provider).await?;
        self.session.update_user().await?;
        Ok(())
    }

    fn fail(
        &self,
        provider: Option<OAuthProvider>,
        state: Option<String>,
        e: FlowError,
    ) -> OAuthErrorInfo {
        tracing::warn!("oauth flow failed: {}", e);
        let info = OAuthErrorInfo {
            provider,
            state,
            message: e.user_message(),
        };
        self.popup.set_oauth_error(info.clone());
        self.popup.set_view(View::OAuthError);
        info
    }
}

/// Remove the OAuth callback parameters from a URL, preserving the rest.
fn scrub_callback_params(url: &Url) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !CALLBACK_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut sanitized = url.clone();
    if retained.is_empty() {
        sanitized.set_query(None);
    } else {
        sanitized
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .finish();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_removes_only_callback_params() {
        let url = Url::parse(
            "https://app.example.com/dash?tab=settings&code=abc&state=s1&provider=google&error=x",
        )
        .unwrap();
        let sanitized = scrub_callback_params(&url);
        assert_eq!(
            sanitized.as_str(),
            "https://app.example.com/dash?tab=settings"
        );
    }

    #[test]
    fn scrub_drops_empty_query_entirely() {
        let url = Url::parse("https://app.example.com/dash?code=abc&state=s1").unwrap();
        let sanitized = scrub_callback_params(&url);
        assert_eq!(sanitized.as_str(), "https://app.example.com/dash");
        assert!(sanitized.query().is_none());
    }

    #[test]
    fn scrub_is_identity_without_callback_params() {
        let url = Url::parse("https://app.example.com/dash?tab=a&page=2").unwrap();
        assert_eq!(scrub_callback_params(&url), url);
    }
}
