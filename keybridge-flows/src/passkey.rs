//! Passkey (WebAuthn) flow engine.
//!
//! The backend speaks base64url for every binary ceremony field; the
//! platform ceremony wants raw bytes. The conversions here are exact and
//! padding-tolerant in both directions; a loose re-encode is the classic
//! cause of server-side signature verification failures.

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use keybridge_core::{ApiClient, SessionManager, b64url_decode, b64url_encode};
use keybridge_popup::{PopupController, View};

use crate::ceremony::PasskeyCeremony;
use crate::error::FlowError;

/// Options for the "get credential" (assertion) ceremony, binary form.
#[derive(Debug, Clone)]
pub struct AssertionOptions {
    pub challenge: Vec<u8>,
    pub rp_id: Option<String>,
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Result of the assertion ceremony, binary form.
#[derive(Debug, Clone)]
pub struct AssertionResponse {
    pub credential_id: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// Options for the "create credential" (registration) ceremony, binary form.
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub challenge: Vec<u8>,
    pub rp_id: Option<String>,
    pub rp_name: Option<String>,
    pub user_id: Vec<u8>,
    pub user_name: String,
    pub exclude_credentials: Vec<Vec<u8>>,
}

/// Result of the registration ceremony, binary form.
#[derive(Debug, Clone)]
pub struct RegistrationResponse {
    pub credential_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// A completed ceremony response, discriminated by operation kind.
#[derive(Debug, Clone)]
pub enum WebAuthnCredential {
    Assertion(AssertionResponse),
    Registration(RegistrationResponse),
}

impl WebAuthnCredential {
    /// Wire form: every binary field base64url-encoded with padding stripped.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Assertion(a) => json!({
                "kind": "assertion",
                "id": b64url_encode(&a.credential_id),
                "response": {
                    "authenticatorData": b64url_encode(&a.authenticator_data),
                    "clientDataJSON": b64url_encode(&a.client_data_json),
                    "signature": b64url_encode(&a.signature),
                    "userHandle": a.user_handle.as_ref().map(|h| b64url_encode(h)),
                },
            }),
            Self::Registration(r) => json!({
                "kind": "registration",
                "id": b64url_encode(&r.credential_id),
                "response": {
                    "attestationObject": b64url_encode(&r.attestation_object),
                    "clientDataJSON": b64url_encode(&r.client_data_json),
                },
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialDescriptorWire {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssertionOptionsWire {
    challenge: String,
    #[serde(default)]
    rp_id: Option<String>,
    #[serde(default)]
    allow_credentials: Vec<CredentialDescriptorWire>,
    #[serde(default)]
    user_verification: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserWire {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationOptionsWire {
    challenge: String,
    rp: RpWire,
    user: UserWire,
    #[serde(default)]
    exclude_credentials: Vec<CredentialDescriptorWire>,
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, FlowError> {
    b64url_decode(value)
        .map_err(|e| FlowError::InvalidPayload(format!("field {}: {}", name, e)))
}

/// Parse wire assertion options into the binary form the ceremony expects.
pub fn assertion_options_from_wire(wire: &Value) -> Result<AssertionOptions, FlowError> {
    let wire: AssertionOptionsWire = serde_json::from_value(wire.clone())
        .map_err(|e| FlowError::InvalidPayload(format!("assertion options: {}", e)))?;
    let allow_credentials = wire
        .allow_credentials
        .iter()
        .map(|c| decode_field("allowCredentials.id", &c.id))
        .collect::<Result<_, _>>()?;
    Ok(AssertionOptions {
        challenge: decode_field("challenge", &wire.challenge)?,
        rp_id: wire.rp_id,
        allow_credentials,
        user_verification: wire.user_verification,
        timeout_ms: wire.timeout,
    })
}

/// Parse wire registration options into the binary form the ceremony expects.
pub fn registration_options_from_wire(wire: &Value) -> Result<RegistrationOptions, FlowError> {
    let wire: RegistrationOptionsWire = serde_json::from_value(wire.clone())
        .map_err(|e| FlowError::InvalidPayload(format!("registration options: {}", e)))?;
    let exclude_credentials = wire
        .exclude_credentials
        .iter()
        .map(|c| decode_field("excludeCredentials.id", &c.id))
        .collect::<Result<_, _>>()?;
    Ok(RegistrationOptions {
        challenge: decode_field("challenge", &wire.challenge)?,
        rp_id: wire.rp.id,
        rp_name: wire.rp.name,
        user_id: decode_field("user.id", &wire.user.id)?,
        user_name: wire.user.name,
        exclude_credentials,
    })
}

/// Drives the passkey login and link flows.
pub struct PasskeyFlow {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    popup: Arc<PopupController>,
    ceremony: Arc<dyn PasskeyCeremony>,
}

impl PasskeyFlow {
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        popup: Arc<PopupController>,
        ceremony: Arc<dyn PasskeyCeremony>,
    ) -> Self {
        Self {
            api,
            session,
            popup,
            ceremony,
        }
    }

    /// Log in with an existing passkey.
    pub async fn login(&self) {
        self.popup.set_linking(false);
        self.popup.set_view(View::PasskeySigning);
        match self.try_login().await {
            Ok(()) => self.popup.set_view(View::PasskeySuccess),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative login variant.
    pub async fn try_login(&self) -> Result<(), FlowError> {
        let wire = self.api.passkey_init(None).await?;
        let options = assertion_options_from_wire(&wire)?;
        let response = self.ceremony.get(options).await?;

        self.popup.set_view(View::PasskeyVerifying);
        let credential = WebAuthnCredential::Assertion(response).to_wire();
        let pair = self.api.passkey_verify_login(credential).await?;
        self.session.install_session(pair).await?;
        tracing::info!("passkey login complete");
        Ok(())
    }

    /// Register a new passkey on the authenticated account.
    pub async fn link(&self) {
        self.popup.set_linking(true);
        self.popup.set_view(View::PasskeySigning);
        match self.try_link().await {
            Ok(()) => self.popup.set_view(View::PasskeySuccess),
            Err(e) => self.fail(e),
        }
    }

    /// Imperative link variant.
    pub async fn try_link(&self) -> Result<(), FlowError> {
        let user_id = self
            .session
            .cell()
            .snapshot()
            .user
            .map(|u| u.id);
        let wire = self.api.passkey_init(user_id.as_deref()).await?;
        let options = registration_options_from_wire(&wire)?;
        let response = self.ceremony.create(options).await?;

        self.popup.set_view(View::PasskeyVerifying);
        let credential = WebAuthnCredential::Registration(response).to_wire();
        self.api.passkey_verify_link(credential).await?;
        self.session.update_user().await?;
        tracing::info!("passkey linked");
        Ok(())
    }

    /// Unlink a passkey by credential id and refresh the user snapshot.
    pub async fn try_unlink(&self, credential_id: &str) -> Result<(), FlowError> {
        self.api.passkey_unlink(credential_id).await?;
        self.session.update_user().await?;
        Ok(())
    }

    fn fail(&self, e: FlowError) {
        tracing::warn!("passkey flow failed: {}", e);
        self.popup.set_error_message(e.user_message());
        self.popup.set_view(View::PasskeyError);
    }
}
