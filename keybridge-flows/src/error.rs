//! Flow-level error type and user-facing message selection.

use thiserror::Error;

use keybridge_core::{ApiError, SessionError};

use crate::ceremony::CeremonyError;

/// Generic fallback shown when neither the server nor the ceremony provided
/// anything better.
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error from a credential flow step.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A backend call failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Installing or updating the session failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// An external ceremony failed.
    #[error("ceremony error: {0}")]
    Ceremony(#[from] CeremonyError),

    /// A wire payload could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl FlowError {
    /// The server-supplied message, when this error carries one.
    fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.server_message(),
            Self::Session(SessionError::Api(e)) => e.server_message(),
            _ => None,
        }
    }

    /// The message shown in the popup's error view.
    ///
    /// Server-supplied messages always take priority; ceremony errors fall
    /// back to their category message; everything else gets the generic one.
    pub fn user_message(&self) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        match self {
            Self::Ceremony(e) => e.friendly_message().to_string(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_takes_priority() {
        let err = FlowError::Api(ApiError::Api {
            status: 400,
            message: "code has expired".into(),
        });
        assert_eq!(err.user_message(), "code has expired");
    }

    #[test]
    fn nested_session_api_message_surfaces() {
        let err = FlowError::Session(SessionError::Api(ApiError::Api {
            status: 400,
            message: "bad signature".into(),
        }));
        assert_eq!(err.user_message(), "bad signature");
    }

    #[test]
    fn ceremony_category_used_without_server_message() {
        let err = FlowError::Ceremony(CeremonyError::Rejected);
        assert_eq!(err.user_message(), "The request was declined.");
    }

    #[test]
    fn transport_errors_get_generic_message() {
        let err = FlowError::Api(ApiError::Unauthorized);
        assert_eq!(err.user_message(), GENERIC_MESSAGE);

        let err = FlowError::InvalidPayload("bad base64".into());
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }
}
