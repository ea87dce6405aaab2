//! Per-request decoration context.
//!
//! All state the request layer needs to decorate outbound calls lives in one
//! explicit [`RequestContext`] shared by reference: the app id, the optional
//! visitor (device-fingerprint) id, and the current access token. The session
//! layer is the only writer of the token; the API client reads it per call.

use parking_lot::RwLock;

use crate::store::Secret;

/// Shared request-decoration state.
///
/// Constructed once per [`crate::api::ApiClient`] and updated by the session
/// lifecycle as tokens are installed and cleared.
pub struct RequestContext {
    app_id: String,
    visitor_id: RwLock<Option<String>>,
    access_token: RwLock<Option<Secret>>,
}

impl RequestContext {
    /// Create a context for the given app id, with no visitor id or token.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            visitor_id: RwLock::new(None),
            access_token: RwLock::new(None),
        }
    }

    /// The app id sent with every request.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The visitor id, if a fingerprint collaborator has provided one.
    pub fn visitor_id(&self) -> Option<String> {
        self.visitor_id.read().clone()
    }

    /// Set the visitor id reported by the device-fingerprint collaborator.
    pub fn set_visitor_id(&self, visitor_id: impl Into<String>) {
        *self.visitor_id.write() = Some(visitor_id.into());
    }

    /// Generate and install a random v4 visitor id.
    ///
    /// Fallback for embeddings without a fingerprint service.
    pub fn generate_visitor_id(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        *self.visitor_id.write() = Some(id.clone());
        id
    }

    /// The current access token, if a session is installed.
    pub fn access_token(&self) -> Option<Secret> {
        self.access_token.read().clone()
    }

    /// Install or replace the access token.
    pub fn set_access_token(&self, token: Option<Secret>) {
        *self.access_token.write() = token;
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("app_id", &self.app_id)
            .field("visitor_id", &self.visitor_id.read())
            .field("has_token", &self.access_token.read().is_some())
            .finish()
    }
}
