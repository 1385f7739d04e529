use std::fmt;

/// Failures talking to the gateway backend.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("gateway error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why one model produced no reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelFailure {
    pub model_id: String,
    pub reason: String,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model_id, self.reason)
    }
}

/// Rejections and aggregate failures of a playground send.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("Type a message before sending")]
    EmptyInput,

    #[error("Select at least one model")]
    NoModels,

    #[error("A message is already being sent")]
    Busy,

    #[error("All models failed: {}", join_failures(.0))]
    AllFailed(Vec<ModelFailure>),
}

impl SendError {
    /// Validation errors are rejected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, SendError::EmptyInput | SendError::NoModels)
    }
}

fn join_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tab persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Json(#[from] serde_json::Error),
}
