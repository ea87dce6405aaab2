//! Construction of the orchestration facade.

use std::sync::Arc;

use keybridge_core::{
    ApiClient, KeybridgeError, MemoryStore, RequestContext, SessionCell, SessionConfig,
    SessionManager, TokenStore,
};
use keybridge_flows::{
    EmailFlow, OAuthFlow, PasskeyCeremony, PasskeyFlow, TotpFlow, WalletConnector, WalletFlow,
};
use keybridge_popup::PopupController;

use crate::facade::Keybridge;

/// Builder for [`Keybridge`].
///
/// Only the backend base URL and app id are required; everything else has a
/// sensible default (in-memory token store, default lifecycle tunables, no
/// wallet connectors, no passkey ceremony).
pub struct KeybridgeBuilder {
    base_url: String,
    app_id: String,
    app_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    session_config: SessionConfig,
    connectors: Vec<Arc<dyn WalletConnector>>,
    passkey_ceremony: Option<Arc<dyn PasskeyCeremony>>,
    visitor_id: Option<String>,
}

impl KeybridgeBuilder {
    pub(crate) fn new(base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
            app_url: None,
            store: None,
            session_config: SessionConfig::default(),
            connectors: Vec::new(),
            passkey_ceremony: None,
            visitor_id: None,
        }
    }

    /// The page URL embedded in SIWE challenge requests. Defaults to the
    /// backend base URL.
    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    /// Token storage backend. Defaults to [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the session lifecycle tunables.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Register a wallet connector. Call once per available connector.
    pub fn connector(mut self, connector: Arc<dyn WalletConnector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Wire the platform WebAuthn ceremony. Without it the passkey method is
    /// reported unavailable.
    pub fn passkey_ceremony(mut self, ceremony: Arc<dyn PasskeyCeremony>) -> Self {
        self.passkey_ceremony = Some(ceremony);
        self
    }

    /// Device-fingerprint id attached to every request when provided.
    pub fn visitor_id(mut self, visitor_id: impl Into<String>) -> Self {
        self.visitor_id = Some(visitor_id.into());
        self
    }

    /// Compose the facade.
    pub fn build(self) -> Result<Keybridge, KeybridgeError> {
        if self.app_id.is_empty() {
            return Err(KeybridgeError::Config {
                message: "app id must not be empty".to_string(),
            });
        }

        let context = Arc::new(RequestContext::new(self.app_id));
        if let Some(visitor_id) = self.visitor_id {
            context.set_visitor_id(visitor_id);
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let cell = Arc::new(SessionCell::new(store, context, self.session_config));
        let api = Arc::new(ApiClient::new(&self.base_url, cell.clone())?);
        let session = Arc::new(SessionManager::new(cell, api.clone()));
        let popup = Arc::new(PopupController::new());

        let app_url = self.app_url.unwrap_or_else(|| self.base_url.clone());
        let email = EmailFlow::new(api.clone(), session.clone(), popup.clone());
        let oauth = OAuthFlow::new(api.clone(), session.clone(), popup.clone());
        let wallet = WalletFlow::new(
            api.clone(),
            session.clone(),
            popup.clone(),
            self.connectors,
            app_url,
        );
        let passkey = self.passkey_ceremony.clone().map(|ceremony| {
            PasskeyFlow::new(api.clone(), session.clone(), popup.clone(), ceremony)
        });
        let totp = TotpFlow::new(api.clone(), session.clone(), popup.clone());

        Ok(Keybridge::assemble(
            api,
            session,
            popup,
            email,
            oauth,
            wallet,
            passkey,
            totp,
            self.passkey_ceremony,
        ))
    }
}
