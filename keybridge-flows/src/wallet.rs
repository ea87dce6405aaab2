//! Wallet (SIWE-style) flow engine.
//!
//! The full sequence: choose a connector, disconnect any previous session,
//! connect (racing a cancelable pairing-URI capture for QR connectors),
//! request a challenge, sign the exact SIWE text, then submit the signature
//! for verification. Login installs a token pair; link confirms the linkage
//! and refreshes the user snapshot.

use std::sync::Arc;
use std::time::Duration;

use keybridge_core::{ApiClient, RECENT_CONNECTOR_KEY, Secret, SessionManager};
use keybridge_popup::{PopupController, View, WalletInfo};

use crate::ceremony::{CeremonyError, WalletConnector};
use crate::error::FlowError;
use crate::siwe::SiweMessage;

/// Delay before falling back to polling for a pairing URI. Providers are
/// inconsistent about emitting the URI as an event at all.
pub const QR_POLL_FALLBACK_DELAY: Duration = Duration::from_millis(1000);

/// SIWE message version requested from the backend.
const SIWE_VERSION: &str = "1";

/// A connector as presented in the selection view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEntry {
    pub id: String,
    pub name: String,
    /// Remote signers pair through a QR code; the selection view badges them.
    pub requires_qr: bool,
}

/// Drives the wallet login and link flows.
pub struct WalletFlow {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
    connectors: Vec<Arc<dyn WalletConnector>>,
    /// Page URI embedded in the SIWE challenge request.
    app_url: String,
}

impl WalletFlow {
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        popup: Arc<PopupController>,
        connectors: Vec<Arc<dyn WalletConnector>>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            api,
            session,
            popup,
            connectors,
            app_url: app_url.into(),
        }
    }

    /// The connector list for the selection view: most-recently-used first,
    /// annotated with the QR flag.
    pub async fn connector_entries(&self) -> Vec<ConnectorEntry> {
        let mut entries: Vec<ConnectorEntry> = self
            .connectors
            .iter()
            .map(|c| ConnectorEntry {
                id: c.id().to_string(),
                name: c.name().to_string(),
                requires_qr: c.requires_qr(),
            })
            .collect();

        let recent = self
            .session
            .cell()
            .store()
            .get(RECENT_CONNECTOR_KEY)
            .await
            .ok()
            .flatten()
            .map(|s| s.expose().to_string());
        if let Some(recent) = recent {
            if let Some(pos) = entries.iter().position(|e| e.id == recent) {
                let entry = entries.remove(pos);
                entries.insert(0, entry);
            }
        }
        entries
    }

    /// Start a login. With no connector chosen, shows the selection view and
    /// waits for [`choose_connector`](Self::choose_connector).
    pub async fn login(&self, connector_id: Option<&str>) {
        self.popup.set_linking(false);
        self.start(connector_id).await;
    }

    /// Start a link for the authenticated account.
    pub async fn link(&self, connector_id: Option<&str>) {
        self.popup.set_linking(true);
        self.start(connector_id).await;
    }

    async fn start(&self, connector_id: Option<&str>) {
        match connector_id {
            Some(id) => self.proceed_with(id).await,
            None => self.popup.set_view(View::WalletConnectorSelect),
        }
    }

    /// Continue after the user picked a connector in the selection view.
    pub async fn choose_connector(&self, connector_id: &str) {
        self.proceed_with(connector_id).await;
    }

    async fn proceed_with(&self, connector_id: &str) {
        let Some(connector) = self
            .connectors
            .iter()
            .find(|c| c.id() == connector_id)
            .cloned()
        else {
            self.fail(CeremonyError::NotFound.into());
            return;
        };

        self.popup.set_connector_id(connector_id);
        self.popup.set_connecting_wallet(WalletInfo {
            id: connector_id.to_string(),
            name: connector.name().to_string(),
        });
        self.popup.set_view(View::WalletConnecting);

        if let Err(e) = self.run_ceremony(&connector).await {
            self.fail(e);
        }
    }

    async fn run_ceremony(&self, connector: &Arc<dyn WalletConnector>) -> Result<(), FlowError> {
        connector.disconnect().await;

        // For QR connectors, capture the pairing URI concurrently: the event
        // subscription races a delayed poll, and the whole task is canceled
        // the moment the connection resolves. Connection never waits on URI
        // capture succeeding.
        let capture = if connector.requires_qr() {
            self.popup.set_view(View::WalletQr);
            let popup = Arc::clone(&self.popup);
            let connector = Arc::clone(connector);
            Some(tokio::spawn(async move {
                let mut events = connector.subscribe_pairing_uri();
                tokio::select! {
                    Some(uri) = events.recv() => {
                        tracing::debug!("pairing URI received via event");
                        popup.set_wallet_uri(uri);
                    }
                    _ = tokio::time::sleep(QR_POLL_FALLBACK_DELAY) => {
                        if let Some(uri) = connector.poll_pairing_uri().await {
                            tracing::debug!("pairing URI obtained via poll fallback");
                            popup.set_wallet_uri(uri);
                        }
                    }
                }
            }))
        } else {
            None
        };

        let connected = connector.connect().await;
        if let Some(capture) = capture {
            capture.abort();
        }
        let account = connected?;
        tracing::info!(address = %account.address, "wallet connected");

        // Remember the connector for next time (best effort)
        if let Err(e) = self
            .session
            .cell()
            .store()
            .set(RECENT_CONNECTOR_KEY, &Secret::new(connector.id()))
            .await
        {
            tracing::debug!("failed to persist recent connector: {}", e);
        }

        let challenge = self
            .api
            .wallet_init(&account.address, &self.app_url, SIWE_VERSION, account.chain_id)
            .await?;
        let message = SiweMessage::from(&challenge).to_string();

        self.popup.set_view(View::WalletSigning);
        let signature = connector.sign_message(&message).await?;

        self.popup.set_view(View::WalletVerifying);
        let wallet_type = connector.kind().as_str();
        if self.popup.is_linking() {
            self.api
                .wallet_link(&signature, &challenge.nonce, wallet_type)
                .await?;
            self.session.update_user().await?;
        } else {
            let pair = self
                .api
                .wallet_auth(&signature, &challenge.nonce, wallet_type)
                .await?;
            self.session.install_session(pair).await?;
        }

        self.popup.set_view(View::WalletSuccess);
        Ok(())
    }

    /// Unlink a wallet by address and refresh the user snapshot.
    pub async fn try_unlink(&self, address: &str) -> Result<(), FlowError> {
        self.api.wallet_unlink(address).await?;
        self.session.update_user().await?;
        Ok(())
    }

    fn fail(&self, e: FlowError) {
        tracing::warn!("wallet flow failed: {}", e);
        let message = e.user_message();
        self.popup.set_wallet_error(message.clone());
        self.popup.set_error_message(message);
        self.popup.set_view(View::WalletError);
    }
}
