use reqwest::StatusCode;

/// Failure talking to one of the collaborator services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Rejected before any request was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// HTTP 422 with field-level messages.
    #[error("validation failed:\n{}", .messages.join("\n"))]
    Validation { messages: Vec<String> },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("access to {0} denied")]
    Forbidden(&'static str),

    /// HTTP 500.
    #[error("server error: {detail}")]
    Server { detail: String },

    /// Any other non-2xx status.
    #[error("{context} failed: HTTP {status}")]
    Status {
        status: StatusCode,
        context: &'static str,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Server { .. } => "server",
            Self::Status { .. } => "status",
            Self::Transport(e) if e.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
        }
    }
}
