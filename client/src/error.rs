//! User-facing error taxonomy for the booking client.
//!
//! Every failure a controller surfaces falls into one of six kinds.
//! `Validation` and `State` are resolved entirely at the controller boundary
//! and never reach the network. `AuthExpired` is handled centrally by the
//! session manager (forced logout) no matter which operation triggered it.
//! The rest carry a message for the notification surface and leave domain
//! state conservatively unchanged.

use crate::api::ApiError;
use thiserror::Error;

/// Classified, user-facing failure.
///
/// Variants are `Clone` so actions can carry them through the store.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Client-side input shape violation. No network call was made.
    #[error("{0}")]
    Validation(String),

    /// Operation invoked outside its valid state (verify without a
    /// challenge, a second submit while one is pending, ...).
    #[error("{0}")]
    State(String),

    /// An authenticated action was attempted while logged out.
    #[error("please sign in to continue")]
    AuthRequired,

    /// The server rejected the bearer credential. Triggers forced logout.
    #[error("your session has expired, please sign in again")]
    AuthExpired,

    /// Any other server-reported failure; the server's message verbatim.
    #[error("{0}")]
    Remote(String),

    /// Network-level failure with no server message available.
    #[error("network error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether this failure must route through forced logout.
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => Self::AuthExpired,
            ApiError::Server { message, .. } => Self::Remote(message),
            ApiError::Transport(message) | ApiError::Decode(message) => Self::Transport(message),
        }
    }
}
