//! Error types for the quiz polling client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL could not be parsed or joined with an endpoint path
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The request never produced a response (connection refused, timed out, ...)
    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    /// The server answered with a status the endpoint does not define
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// The response body could not be decoded
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The game exists but is no longer in its waiting phase
    #[error("Game '{0}' is not accepting participants")]
    GameNotAcceptingParticipants(String),

    /// The server refused the request payload
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The session has no game or participant id yet
    #[error("Not joined to a game")]
    NotJoined,

    /// A poller hit its consecutive failure bound
    #[error("Polling {endpoint} abandoned after {attempts} consecutive failures")]
    PollingAbandoned { endpoint: String, attempts: u32 },
}

impl ClientError {
    /// Whether retrying the same request could succeed.
    ///
    /// Connection-level failures and server-side (5xx) statuses are transient;
    /// everything else reflects the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request { .. } => true,
            ClientError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
