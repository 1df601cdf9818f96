use reqwest::StatusCode;
use thiserror::Error;

/// Failures raised while configuring, authenticating or executing queries.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Authorization error: endpoint returned {status}: {body}")]
    Authorization { status: StatusCode, body: String },
    #[error("HTTP error: endpoint returned {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("Malformed response: endpoint returned {status} with a non-JSON body: {body}")]
    MalformedResponse { status: StatusCode, body: String },
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Errors that leave nothing to test and abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::Configuration(_) | ProbeError::Authentication(_)
        )
    }

    /// Short stable label used for metrics and error artifacts.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Configuration(_) => "configuration",
            ProbeError::Authentication(_) => "authentication",
            ProbeError::Network(_) => "network",
            ProbeError::Authorization { .. } => "authorization",
            ProbeError::Http { .. } => "http",
            ProbeError::MalformedResponse { .. } => "malformed_response",
            ProbeError::Io(_) => "io",
        }
    }

    /// Status code carried by the error, if the endpoint answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProbeError::Authorization { status, .. }
            | ProbeError::Http { status, .. }
            | ProbeError::MalformedResponse { status, .. } => Some(*status),
            ProbeError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Response body carried by the error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ProbeError::Authorization { body, .. }
            | ProbeError::Http { body, .. }
            | ProbeError::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}
