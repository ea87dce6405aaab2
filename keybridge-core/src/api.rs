//! Backend API client.
//!
//! One [`ApiClient`] fronts the whole `/api` surface the orchestration core
//! consumes. Every outbound request is decorated from the shared
//! [`RequestContext`] (bearer token, app id, visitor id), and every
//! authorized call goes through a single executor implementing the reactive
//! refresh policy: a 401 from the backend's own host triggers one coalesced
//! refresh exchange and exactly one retry of the original request. A second
//! 401 propagates after the session is cleared locally. 401s from any other
//! host are returned untouched.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use std::sync::Arc;
use url::Url;

use crate::model::{AppConfig, AuthEvent, OAuthProvider, User};
use crate::session::SessionCell;
use crate::store::StoreError;

/// Error type for backend API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection, DNS, body read).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The configured base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server rejected the request. `message` is the server-supplied
    /// human-readable message when one was present.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request was unauthorized and could not be recovered by a refresh.
    #[error("unauthorized")]
    Unauthorized,

    /// A refresh was requested but no refresh token is stored.
    #[error("no session to refresh")]
    NoSession,

    /// Token storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// The server-supplied message, if this error carries one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Response envelope: every mutating/auth endpoint wraps its payload in `data`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Server error body; either field may carry the message.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// SIWE challenge payload returned by `wallet/init`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletChallenge {
    pub domain: String,
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
}

/// Shared secret + optional provider-supplied provisioning URI from `mfa/init`.
#[derive(Debug, Clone, Deserialize)]
pub struct MfaInitResponse {
    pub secret: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// HTTP client for the keybridge backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    cell: Arc<SessionCell>,
}

impl ApiClient {
    /// Create a client rooted at `{base_url}/api`.
    pub fn new(base_url: &str, cell: Arc<SessionCell>) -> Result<Self, ApiError> {
        let base = base_url.trim_end_matches('/');
        let base_url = Url::parse(&format!("{}/api", base))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            cell,
        })
    }

    /// The resolved API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let current = url.path().to_string();
        // path may carry a query string
        if let Some(query_start) = path.find('?') {
            url.set_path(&format!("{}{}", current, &path[..query_start]));
            url.set_query(Some(&path[query_start + 1..]));
        } else {
            url.set_path(&format!("{}{}", current, path));
        }
        url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header("x-app-id", self.cell.context().app_id());
        if let Some(visitor) = self.cell.context().visitor_id() {
            req = req.header("x-visitor-id", visitor);
        }
        if let Some(token) = self.cell.context().access_token() {
            req = req.bearer_auth(token.expose());
        }
        req
    }

    /// Execute an authorized request under the reactive refresh policy.
    ///
    /// Retries the original request at most once, and only after a 401 from
    /// the backend's own host followed by a successful refresh exchange.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let req = req.build()?;
        let retry = req.try_clone();
        let resp = self.http.execute(req).await?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        if resp.url().host_str() != self.base_url.host_str() {
            // Not our backend; never intercepted.
            return Ok(resp);
        }
        if self.cell.context().access_token().is_none() {
            // Not an authenticated call; nothing to refresh.
            return Ok(resp);
        }
        let Some(mut retry) = retry else {
            return Ok(resp);
        };

        tracing::debug!(url = %resp.url(), "401 from backend, attempting refresh-and-retry");
        if let Err(e) = self.refresh_exchange_coalesced().await {
            tracing::warn!("reactive refresh failed: {}", e);
            self.cell.clear_local(AuthEvent::SessionExpired).await;
            return Err(ApiError::Unauthorized);
        }

        // Re-decorate the retry with the freshly installed token.
        match self.cell.context().access_token() {
            Some(token) => {
                let value = format!("Bearer {}", token.expose())
                    .parse()
                    .map_err(|_| ApiError::Unauthorized)?;
                retry.headers_mut().insert(AUTHORIZATION, value);
            }
            None => return Err(ApiError::Unauthorized),
        }

        let resp = self.http.execute(retry).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            // The retried request is never retried again.
            return Err(ApiError::Unauthorized);
        }
        Ok(resp)
    }

    async fn handle_json<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(self.parse_error(status, resp).await);
        }
        let envelope: Envelope<T> = resp.json().await?;
        Ok(envelope.data)
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), ApiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(self.parse_error(status, resp).await);
        }
        Ok(())
    }

    async fn parse_error(&self, status: StatusCode, resp: reqwest::Response) -> ApiError {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body
                .message
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            Err(_) => format!("HTTP {}", status.as_u16()),
        };
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }

    // ── Session ──────────────────────────────────────────────

    /// Refresh exchange with concurrent attempts coalesced into one.
    ///
    /// The first caller to take the guard performs the exchange; waiters that
    /// observe the token changed while blocked return without a second
    /// network call.
    pub async fn refresh_exchange_coalesced(&self) -> Result<(), ApiError> {
        let before = self.cell.context().access_token();
        let _guard = self.cell.refresh_guard().lock().await;
        let current = self.cell.context().access_token();
        if current.is_some() && current != before {
            tracing::debug!("refresh already performed by a concurrent caller");
            return Ok(());
        }
        self.refresh_exchange_locked().await
    }

    async fn refresh_exchange_locked(&self) -> Result<(), ApiError> {
        let refresh_token = self
            .cell
            .stored_refresh_token()
            .await?
            .ok_or(ApiError::NoSession)?;

        // Plain send: the refresh call itself is never intercepted.
        let resp = self
            .request(Method::POST, "/session/refresh")
            .json(&json!({ "refresh_token": refresh_token.expose() }))
            .send()
            .await?;
        let pair: TokenPair = self.handle_json(resp).await?;
        self.cell.install_pair(&pair, AuthEvent::TokenRefreshed).await?;
        tracing::info!("session refreshed");
        Ok(())
    }

    /// Best-effort server-side revocation of a refresh token.
    pub async fn revoke_session(&self, refresh_token: &str) -> Result<(), ApiError> {
        let resp = self
            .request(Method::POST, "/session/revoke")
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        self.handle_empty(resp).await
    }

    /// Fetch the current user profile.
    pub async fn fetch_user(&self) -> Result<User, ApiError> {
        let resp = self.execute(self.request(Method::GET, "/session/user")).await?;
        self.handle_json(resp).await
    }

    // ── App config ───────────────────────────────────────────

    /// Fetch the application configuration.
    pub async fn app_config(&self) -> Result<AppConfig, ApiError> {
        let resp = self.execute(self.request(Method::GET, "/config")).await?;
        self.handle_json(resp).await
    }

    // ── Email ────────────────────────────────────────────────

    /// Request a one-time code be sent to `email`.
    pub async fn email_init(&self, email: &str) -> Result<(), ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/email/init")
                    .json(&json!({ "email": email })),
            )
            .await?;
        self.handle_empty(resp).await
    }

    /// Exchange an email + code for a token pair.
    pub async fn email_auth(&self, email: &str, code: &str) -> Result<TokenPair, ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/email/auth")
                    .json(&json!({ "email": email, "code": code })),
            )
            .await?;
        self.handle_json(resp).await
    }

    /// Link an email to the authenticated account.
    pub async fn email_link(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/email/link")
                    .json(&json!({ "email": email, "code": code })),
            )
            .await?;
        self.handle_empty(resp).await
    }

    /// Unlink the email credential.
    pub async fn email_unlink(&self) -> Result<(), ApiError> {
        let resp = self.execute(self.request(Method::DELETE, "/email")).await?;
        self.handle_empty(resp).await
    }

    // ── OAuth ────────────────────────────────────────────────

    /// Request the provider redirect URL, passing the page to return to.
    pub async fn oauth_init(
        &self,
        provider: OAuthProvider,
        redirect_uri: &str,
    ) -> Result<Url, ApiError> {
        #[derive(Deserialize)]
        struct Init {
            url: String,
        }
        let path = format!("/oauth/{}/init", provider);
        let resp = self
            .execute(
                self.request(Method::GET, &path)
                    .query(&[("redirect_uri", redirect_uri)]),
            )
            .await?;
        let init: Init = self.handle_json(resp).await?;
        Ok(Url::parse(&init.url)?)
    }

    /// Exchange a callback code for a token pair.
    pub async fn oauth_exchange(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<TokenPair, ApiError> {
        let path = format!("/oauth/{}/exchange", provider);
        let resp = self
            .execute(self.request(Method::POST, &path).query(&[("code", code)]))
            .await?;
        self.handle_json(resp).await
    }

    /// Unlink an OAuth identity.
    pub async fn oauth_unlink(&self, provider: OAuthProvider) -> Result<(), ApiError> {
        let path = format!("/oauth/{}", provider);
        let resp = self.execute(self.request(Method::DELETE, &path)).await?;
        self.handle_empty(resp).await
    }

    // ── Wallet ───────────────────────────────────────────────

    /// Request a SIWE challenge for the connected address.
    pub async fn wallet_init(
        &self,
        address: &str,
        uri: &str,
        version: &str,
        chain_id: u64,
    ) -> Result<WalletChallenge, ApiError> {
        let resp = self
            .execute(self.request(Method::POST, "/wallet/init").json(&json!({
                "address": address,
                "uri": uri,
                "version": version,
                "chainId": chain_id,
            })))
            .await?;
        self.handle_json(resp).await
    }

    /// Submit a challenge signature for login.
    pub async fn wallet_auth(
        &self,
        signature: &str,
        nonce: &str,
        wallet_type: &str,
    ) -> Result<TokenPair, ApiError> {
        let resp = self
            .execute(self.request(Method::POST, "/wallet/auth").json(&json!({
                "signature": signature,
                "nonce": nonce,
                "type": wallet_type,
            })))
            .await?;
        self.handle_json(resp).await
    }

    /// Submit a challenge signature to link the wallet to the account.
    pub async fn wallet_link(
        &self,
        signature: &str,
        nonce: &str,
        wallet_type: &str,
    ) -> Result<(), ApiError> {
        let resp = self
            .execute(self.request(Method::POST, "/wallet/link").json(&json!({
                "signature": signature,
                "nonce": nonce,
                "type": wallet_type,
            })))
            .await?;
        self.handle_empty(resp).await
    }

    /// Unlink a wallet by address.
    pub async fn wallet_unlink(&self, address: &str) -> Result<(), ApiError> {
        let path = format!("/wallet/{}", address);
        let resp = self.execute(self.request(Method::DELETE, &path)).await?;
        self.handle_empty(resp).await
    }

    // ── Passkey ──────────────────────────────────────────────

    /// Request WebAuthn ceremony options.
    ///
    /// The payload is opaque to the core; the passkey engine owns its shape.
    pub async fn passkey_init(
        &self,
        user_handle: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut body = json!({});
        if let Some(handle) = user_handle {
            body["userHandle"] = json!(handle);
        }
        let resp = self
            .execute(self.request(Method::POST, "/passkey/init").json(&body))
            .await?;
        self.handle_json(resp).await
    }

    /// Submit a ceremony response for login verification.
    pub async fn passkey_verify_login(
        &self,
        credential: serde_json::Value,
    ) -> Result<TokenPair, ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/passkey/verify")
                    .json(&json!({ "credential": credential })),
            )
            .await?;
        self.handle_json(resp).await
    }

    /// Submit a ceremony response to link a new passkey.
    pub async fn passkey_verify_link(
        &self,
        credential: serde_json::Value,
    ) -> Result<(), ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/passkey/verify")
                    .json(&json!({ "credential": credential })),
            )
            .await?;
        self.handle_empty(resp).await
    }

    /// Unlink a passkey by credential id.
    pub async fn passkey_unlink(&self, credential_id: &str) -> Result<(), ApiError> {
        let path = format!("/passkey/{}", credential_id);
        let resp = self.execute(self.request(Method::DELETE, &path)).await?;
        self.handle_empty(resp).await
    }

    // ── MFA ──────────────────────────────────────────────────

    /// Begin TOTP enrollment.
    pub async fn mfa_init(&self) -> Result<MfaInitResponse, ApiError> {
        let resp = self.execute(self.request(Method::POST, "/mfa/init")).await?;
        self.handle_json(resp).await
    }

    /// Confirm TOTP enrollment with a 6-digit code.
    pub async fn mfa_link(&self, code: &str) -> Result<(), ApiError> {
        let resp = self
            .execute(
                self.request(Method::POST, "/mfa/link")
                    .json(&json!({ "code": code })),
            )
            .await?;
        self.handle_empty(resp).await
    }

    /// Disable TOTP with a 6-digit code.
    pub async fn mfa_unlink(&self, code: &str) -> Result<(), ApiError> {
        let resp = self
            .execute(
                self.request(Method::DELETE, "/mfa")
                    .json(&json!({ "code": code })),
            )
            .await?;
        self.handle_empty(resp).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::session::SessionConfig;
    use crate::store::MemoryStore;

    fn make_client(base: &str) -> ApiClient {
        let context = Arc::new(RequestContext::new("test-app"));
        let cell = Arc::new(SessionCell::new(
            Arc::new(MemoryStore::new()),
            context,
            SessionConfig::default(),
        ));
        ApiClient::new(base, cell).unwrap()
    }

    #[test]
    fn url_building() {
        let client = make_client("https://auth.example.com");
        let url = client.url("/email/init");
        assert_eq!(url.path(), "/api/email/init");
        assert!(url.query().is_none());

        let url = client.url("/oauth/google/init?redirect_uri=x");
        assert_eq!(url.path(), "/api/oauth/google/init");
        assert_eq!(url.query(), Some("redirect_uri=x"));
    }

    #[test]
    fn url_building_trailing_slash() {
        let client = make_client("https://auth.example.com/");
        assert_eq!(client.url("/config").path(), "/api/config");
    }

    #[test]
    fn api_error_display_is_server_message() {
        let err = ApiError::Api {
            status: 400,
            message: "invalid code".to_string(),
        };
        assert_eq!(err.to_string(), "invalid code");
        assert_eq!(err.server_message(), Some("invalid code"));
        assert!(ApiError::Unauthorized.server_message().is_none());
    }
}
