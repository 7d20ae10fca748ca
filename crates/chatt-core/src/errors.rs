use std::time::Duration;

/// Typed errors from the request/response API.
/// Carries the server's human-readable message where one was returned.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(message),
            400 => Self::BadRequest(message),
            404 => Self::NotFound(message),
            500..=599 => Self::Server { status, message },
            _ => Self::BadRequest(format!("unexpected status {status}: {message}")),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Server { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode_error",
        }
    }
}

/// Errors surfaced by the synchronizer itself.
///
/// Validation variants are rejected before any I/O happens; transport
/// variants describe the live channel; `Api` passes a request failure
/// through to the caller unchanged.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    // Validation — rejected synchronously, no network call
    #[error("message has neither text nor image")]
    EmptyMessage,
    #[error("no conversation selected")]
    NoConversation,

    // Transport
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),

    // Request
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyMessage | Self::NoConversation)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::NoConversation => "no_conversation",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Transport(_) => "transport_failure",
            Self::Api(err) => err.error_kind(),
        }
    }
}
