use crate::event::LogEvent;
use http::StatusCode;
use thiserror::Error;

/// Invalid endpoint or transport settings. Always reported before any
/// network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("server is required")]
    MissingServer,

    #[error("index is required")]
    MissingIndex,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("port cannot be 0")]
    InvalidPort,

    #[error("request timeout cannot be 0")]
    InvalidTimeout,

    #[error("incomplete AWS credentials, missing: {}", .missing.join(", "))]
    PartialAwsCredentials { missing: Vec<&'static str> },

    #[error("basic auth requires both user and password")]
    PartialBasicAuth,

    #[error("basic auth and AWS signing cannot both be configured")]
    ConflictingAuth,

    #[error("invalid endpoint URL {0}: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("credentials cannot be embedded in {0}")]
    InvalidCredentials(String),

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

/// A batch or document the backend did not accept.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("{endpoint} responded {status} to a {body_size} byte payload")]
    Rejected {
        endpoint: String,
        status: StatusCode,
        body_size: usize,
        response: String,
    },

    #[error("request to {endpoint} with a {body_size} byte payload failed: {source}")]
    Transport {
        endpoint: String,
        body_size: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not serialize log event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

impl DeliveryError {
    /// Connection failures, timeouts, throttling and server errors may
    /// succeed on a later attempt. Everything else will fail the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Rejected { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            DeliveryError::Transport { .. } => true,
            DeliveryError::Serialization(_) | DeliveryError::InvalidHeader(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Rejected { status, .. } => Some(*status),
            DeliveryError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The events are handed back so the caller can decide whether to
    /// discard, re-buffer or escalate them.
    #[error("failed to deliver {} log events: {source}", .undelivered.len())]
    Delivery {
        undelivered: Vec<LogEvent>,
        #[source]
        source: DeliveryError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("injected failure: {0}")]
    Injected(String),
}
