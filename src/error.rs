use std::fmt;

use reqwest::StatusCode;

/// Errors that can occur during a document store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The descriptor has no usable document id; carries the operation name
    MissingId(&'static str),

    /// The server answered with a non-success status
    Status { status: StatusCode, body: String },

    /// The transport could not complete the request
    Transport(String),

    /// The payload could not be serialized
    Serialize(String),

    /// The response body could not be decoded
    Decode(String),
}

impl StoreError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::MissingId(operation) => {
                write!(f, "{} from store must specify an id", operation)
            }
            StoreError::Status { status, body } if body.is_empty() => {
                write!(f, "Request failed with status: {}", status)
            }
            StoreError::Status { status, body } => {
                write!(f, "Request failed with status: {} - {}", status, body)
            }
            StoreError::Transport(msg) => write!(f, "Transport error: {}", msg),
            StoreError::Serialize(msg) => write!(f, "Failed to serialize payload: {}", msg),
            StoreError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Transport(format!("{:#}", err))
    }
}
