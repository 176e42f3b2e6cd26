//! Error types for the request handler.

use routelog_core::CoreError;
use thiserror::Error;

/// Result type for handler operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
///
/// The `Display` text is what the client sees as the response body.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Signup for a username that already exists.
    #[error("That username is already taken. Please choose another.")]
    UsernameTaken,

    /// A session token was required but not sent.
    #[error("{0}")]
    AuthenticationFailed(String),

    /// Credentials or admin token rejected.
    #[error("{0}")]
    NotAuthorized(String),

    /// No such account, snapshot or route.
    #[error("{0}")]
    NotFound(String),

    /// Store or serialization failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::UsernameTaken => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotAuthorized(_) => 403,
            ServerError::NotFound(_) => 404,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UsernameTaken { .. } => ServerError::UsernameTaken,
            CoreError::NotFound { .. } => ServerError::NotFound("User not found".into()),
            CoreError::InvalidCredentials => ServerError::NotAuthorized("Invalid password".into()),
            CoreError::Unauthorized => ServerError::NotAuthorized("Unauthorized".into()),
            CoreError::InvalidInput { message } => ServerError::InvalidRequest(message),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::InvalidRequest(format!("invalid JSON body: {err}"))
    }
}
