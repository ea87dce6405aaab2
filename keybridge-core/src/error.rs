//! Top-level error type for keybridge-core.

use thiserror::Error;

use crate::api::ApiError;
use crate::codec::CodecError;
use crate::session::SessionError;
use crate::store::StoreError;

/// Top-level error type encompassing all core errors.
#[derive(Debug, Error)]
pub enum KeybridgeError {
    /// Error from token storage.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error decoding a token.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Error from the backend API.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Error from the session lifecycle.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
