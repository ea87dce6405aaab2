//! Session token lifecycle management.
//!
//! This module provides:
//! - [`SessionConfig`] - Tunables for expiry buffers, intervals, and throttling
//! - [`SessionCell`] - The shared single-owner state (store, context, status,
//!   events, refresh guard) held by both the [`ApiClient`](crate::api::ApiClient)
//!   and the manager
//! - [`SessionManager`] - Cold-start resolution, proactive refresh, logout
//!
//! # Refresh paths
//!
//! There are two distinct refresh paths that converge on the same terminal
//! behavior:
//! - *Proactive*: a background interval and the visibility-regained trigger
//!   feed a throttled check that refreshes when the access token is absent or
//!   close to expiry.
//! - *Reactive*: the API client refreshes once after a 401 and retries the
//!   original request (see [`crate::api`]).
//!
//! Both take the same in-flight guard, so concurrent attempts coalesce into
//! one exchange, and any refresh failure converges on a full local logout.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError, TokenPair};
use crate::codec;
use crate::context::RequestContext;
use crate::model::{AuthEvent, AuthStatus, SessionSnapshot, User};
use crate::store::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, Secret, StoreError, TokenStore,
};

/// Broadcast channel capacity for auth state change events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Error type for session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A backend call failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The refresh exchange failed; the session has been cleared.
    #[error("session refresh failed: {message}")]
    RefreshFailed { message: String },
}

/// Tunables for the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Safety buffer for the reactive expiry check: a token expiring within
    /// this window counts as expired. Near-zero by default.
    pub expiry_buffer: chrono::Duration,

    /// Buffer for the proactive check: refresh when the access token expires
    /// within this window.
    pub proactive_buffer: chrono::Duration,

    /// Interval of the background proactive-refresh loop.
    pub check_interval: std::time::Duration,

    /// Minimum spacing between proactive checks, however many triggers fire.
    pub check_throttle: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_buffer: chrono::Duration::zero(),
            proactive_buffer: chrono::Duration::seconds(300),
            check_interval: std::time::Duration::from_secs(60),
            check_throttle: std::time::Duration::from_secs(30),
        }
    }
}

/// Check whether a stored access token is expired with respect to a buffer.
///
/// A token whose claims cannot be decoded is treated as expired.
pub fn token_is_expired(token: &str, buffer: chrono::Duration) -> bool {
    match codec::token_expiry(token) {
        Ok(expiry) => expiry <= Utc::now() + buffer,
        Err(e) => {
            tracing::debug!("token decode failed, treating as expired: {}", e);
            true
        }
    }
}

struct State {
    status: AuthStatus,
    ready: bool,
    user: Option<User>,
}

/// Shared session state: the single owner of the token pair and derived
/// status. The manager and the API client both hold an `Arc` of this; all
/// mutation goes through its narrow methods.
pub struct SessionCell {
    store: Arc<dyn TokenStore>,
    context: Arc<RequestContext>,
    config: SessionConfig,
    state: RwLock<State>,
    event_tx: broadcast::Sender<AuthEvent>,
    refresh_guard: tokio::sync::Mutex<()>,
}

impl SessionCell {
    /// Create a new cell over the given store and request context.
    pub fn new(
        store: Arc<dyn TokenStore>,
        context: Arc<RequestContext>,
        config: SessionConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            context,
            config,
            state: RwLock::new(State {
                status: AuthStatus::Unauthenticated,
                ready: false,
                user: None,
            }),
            event_tx,
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// The request-decoration context.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// The persisted token store.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Lifecycle tunables.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The guard coalescing concurrent refresh exchanges.
    pub(crate) fn refresh_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.refresh_guard
    }

    /// Subscribe to auth state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }

    /// Current snapshot of status, readiness, and cached user.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            status: state.status,
            ready: state.ready,
            user: state.user.clone(),
        }
    }

    /// Whether a valid session is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.state.read().status == AuthStatus::Authenticated
    }

    /// Whether initial session resolution has completed.
    pub fn is_ready(&self) -> bool {
        self.state.read().ready
    }

    pub(crate) fn set_ready(&self) {
        self.state.write().ready = true;
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Replace the cached user snapshot and notify subscribers.
    pub(crate) fn set_user(&self, user: Option<User>) {
        self.state.write().user = user;
        self.emit(AuthEvent::UserUpdated);
    }

    pub(crate) async fn stored_refresh_token(&self) -> Result<Option<Secret>, StoreError> {
        self.store.get(REFRESH_TOKEN_KEY).await
    }

    /// Install a new token pair: persist both fields, update the request
    /// context, flip status, notify. The pair supersedes any previous one.
    pub(crate) async fn install_pair(
        &self,
        pair: &TokenPair,
        event: AuthEvent,
    ) -> Result<(), StoreError> {
        let access = Secret::new(pair.access_token.clone());
        let refresh = Secret::new(pair.refresh_token.clone());
        self.store.set(REFRESH_TOKEN_KEY, &refresh).await?;
        self.store.set(ACCESS_TOKEN_KEY, &access).await?;
        self.context.set_access_token(Some(access));
        self.state.write().status = AuthStatus::Authenticated;
        self.emit(event);
        Ok(())
    }

    /// Adopt a stored, still-valid access token on cold start.
    pub(crate) fn adopt_access_token(&self, access: Secret) {
        self.context.set_access_token(Some(access));
        self.state.write().status = AuthStatus::Authenticated;
        self.emit(AuthEvent::SignedIn);
    }

    /// Clear all local session state and notify subscribers.
    pub(crate) async fn clear_local(&self, event: AuthEvent) {
        self.clear_local_quiet().await;
        self.emit(event);
    }

    /// Clear all local session state without emitting an event.
    pub(crate) async fn clear_local_quiet(&self) {
        if let Err(e) = self.store.delete(ACCESS_TOKEN_KEY).await {
            tracing::warn!("failed to delete stored access token: {}", e);
        }
        if let Err(e) = self.store.delete(REFRESH_TOKEN_KEY).await {
            tracing::warn!("failed to delete stored refresh token: {}", e);
        }
        self.context.set_access_token(None);
        let mut state = self.state.write();
        state.status = AuthStatus::Unauthenticated;
        state.user = None;
    }
}

impl std::fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionCell")
            .field("status", &state.status)
            .field("ready", &state.ready)
            .field("has_user", &state.user.is_some())
            .finish()
    }
}

/// Drives the session lifecycle: cold-start resolution, proactive refresh,
/// user cache, and logout.
pub struct SessionManager {
    cell: Arc<SessionCell>,
    api: Arc<ApiClient>,
    last_check: Mutex<Option<Instant>>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager over the shared cell and API client.
    pub fn new(cell: Arc<SessionCell>, api: Arc<ApiClient>) -> Self {
        Self {
            cell,
            api,
            last_check: Mutex::new(None),
            auto_refresh: Mutex::new(None),
        }
    }

    /// The shared session cell.
    pub fn cell(&self) -> &Arc<SessionCell> {
        &self.cell
    }

    /// Resolve the stored session on cold start.
    ///
    /// Ends with `ready = true` in every case: a valid stored access token is
    /// adopted, a stored refresh token is exchanged, and any failure
    /// (storage, decode, network) is swallowed into "no valid session".
    pub async fn resolve_initial_session(&self) {
        if let Err(e) = self.try_resolve_initial().await {
            tracing::warn!("initial session resolution failed, signing out: {}", e);
            self.cell.clear_local_quiet().await;
        }
        self.cell.set_ready();
        tracing::debug!("initial session resolution complete");
    }

    async fn try_resolve_initial(&self) -> Result<(), SessionError> {
        if let Some(access) = self.cell.store().get(ACCESS_TOKEN_KEY).await? {
            if !token_is_expired(access.expose(), self.cell.config().expiry_buffer) {
                tracing::info!("adopting stored access token");
                self.cell.adopt_access_token(access);
                self.update_user().await?;
                return Ok(());
            }
            tracing::debug!("stored access token expired");
        }

        if self.cell.stored_refresh_token().await?.is_some() {
            tracing::info!("attempting cold-start refresh exchange");
            self.api.refresh_exchange_coalesced().await?;
            self.update_user().await?;
            return Ok(());
        }

        // No usable session; make sure nothing stale lingers.
        self.cell.clear_local_quiet().await;
        Ok(())
    }

    /// Explicit refresh. On failure the session is fully cleared rather than
    /// left half-valid.
    pub async fn refresh_session(&self) -> Result<(), SessionError> {
        if let Err(e) = self.api.refresh_exchange_coalesced().await {
            tracing::warn!("session refresh failed, logging out: {}", e);
            self.cell.clear_local(AuthEvent::SignedOut).await;
            return Err(SessionError::RefreshFailed {
                message: e.to_string(),
            });
        }
        Ok(())
    }

    /// Throttled proactive check, shared by the background loop and the
    /// visibility trigger. Refreshes only when the access token is absent or
    /// within the proactive buffer of expiry, and at most once per throttle
    /// window no matter how many triggers fire.
    pub async fn check_and_maybe_refresh(&self) {
        if !self.throttle_permits() {
            return;
        }

        let needs_refresh = match self.cell.context().access_token() {
            None => true,
            Some(token) => {
                token_is_expired(token.expose(), self.cell.config().proactive_buffer)
            }
        };
        if !needs_refresh {
            return;
        }

        match self.cell.stored_refresh_token().await {
            Ok(Some(_)) => {
                tracing::debug!("proactive refresh triggered");
                let _ = self.refresh_session().await;
            }
            Ok(None) => tracing::debug!("proactive check: no refresh token stored"),
            Err(e) => tracing::warn!("proactive check: storage error: {}", e),
        }
    }

    fn throttle_permits(&self) -> bool {
        let mut last = self.last_check.lock();
        if let Some(at) = *last {
            if at.elapsed() < self.cell.config().check_throttle {
                return false;
            }
        }
        *last = Some(Instant::now());
        true
    }

    /// Tab-visibility trigger: a regained tab runs the same throttled check.
    pub async fn handle_visibility_change(&self, visible: bool) {
        if visible {
            self.check_and_maybe_refresh().await;
        }
    }

    /// Start the background proactive-refresh loop.
    pub fn start_auto_refresh(self: &Arc<Self>) {
        self.stop_auto_refresh();
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.cell.config().check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                manager.check_and_maybe_refresh().await;
            }
        });
        *self.auto_refresh.lock() = Some(handle);
    }

    /// Stop the background proactive-refresh loop.
    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.auto_refresh.lock().take() {
            handle.abort();
        }
    }

    /// Install a freshly issued pair after a successful login, then fetch the
    /// user snapshot.
    pub async fn install_session(&self, pair: TokenPair) -> Result<(), SessionError> {
        self.cell.install_pair(&pair, AuthEvent::SignedIn).await?;
        self.update_user().await?;
        Ok(())
    }

    /// Re-fetch and cache the user profile (after any linkage change).
    pub async fn update_user(&self) -> Result<User, SessionError> {
        let user = self.api.fetch_user().await?;
        self.cell.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Log out: best-effort server-side revocation (fire-and-forget), then an
    /// unconditional local clear.
    pub async fn logout(&self) {
        if let Ok(Some(refresh)) = self.cell.stored_refresh_token().await {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                if let Err(e) = api.revoke_session(refresh.expose()).await {
                    tracing::debug!("server-side session revocation failed: {}", e);
                }
            });
        }
        self.cell.clear_local(AuthEvent::SignedOut).await;
        tracing::info!("logged out");
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("cell", &self.cell)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::b64url_encode;

    fn token_expiring_at(exp: i64) -> String {
        let claims = format!(r#"{{"exp":{}}}"#, exp);
        format!("h.{}.s", b64url_encode(claims.as_bytes()))
    }

    #[test]
    fn expiry_boundary_with_buffer() {
        for buffer_secs in [0i64, 30, 300] {
            let buffer = chrono::Duration::seconds(buffer_secs);
            let now = Utc::now().timestamp();

            let just_inside = token_expiring_at(now + buffer_secs - 1);
            assert!(
                token_is_expired(&just_inside, buffer),
                "exp = now + buffer - 1 must be expired (buffer {}s)",
                buffer_secs
            );

            let just_outside = token_expiring_at(now + buffer_secs + 1);
            assert!(
                !token_is_expired(&just_outside, buffer),
                "exp = now + buffer + 1 must not be expired (buffer {}s)",
                buffer_secs
            );
        }
    }

    #[test]
    fn undecodable_token_is_expired() {
        assert!(token_is_expired("garbage", chrono::Duration::zero()));
        assert!(token_is_expired("a.b.c", chrono::Duration::zero()));
    }

    #[test]
    fn default_config_values() {
        let config = SessionConfig::default();
        assert_eq!(config.proactive_buffer, chrono::Duration::seconds(300));
        assert_eq!(config.check_interval, std::time::Duration::from_secs(60));
        assert_eq!(config.check_throttle, std::time::Duration::from_secs(30));
    }
}
