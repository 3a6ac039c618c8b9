use serde::Serialize;

/// Shared error type used across all pagewright crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No usable credential or invalid configuration. Never reaches the network.
    #[error("configuration: {0}")]
    Config(String),

    /// Non-success HTTP status or an error reported by the provider itself.
    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Network failure, abrupt stream termination, or timeout.
    #[error("transport: {0}")]
    Transport(String),

    #[error("extraction: {0}")]
    Extraction(#[from] ExtractionError),

    /// Caller supplied a request missing required fields.
    #[error("validation: {0}")]
    Validation(String),

    /// The session is not in a state that allows the requested operation.
    #[error("state: {0}")]
    State(String),

    /// The work was started before a reset or has been replaced by a newer
    /// command; its writes are refused.
    #[error("superseded: the session was reset or a newer command started")]
    Superseded,

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which fenced block an extraction was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Json,
    Code,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Json => f.write_str("json"),
            BlockKind::Code => f.write_str("code"),
        }
    }
}

/// Failure to pull a structured payload out of model text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no fenced {block} block in response")]
    Missing { block: BlockKind },

    #[error("fenced {block} block is not valid: {reason}")]
    InvalidJson { block: BlockKind, reason: String },

    #[error("{0}")]
    Invalid(String),
}

impl Error {
    /// Failure class carried on terminal stream events.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Error::Config(_) => FailureClass::Configuration,
            Error::Transport(_) | Error::Io(_) => FailureClass::Transport,
            _ => FailureClass::Provider,
        }
    }
}

/// Coarse failure category for in-band stream errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Configuration,
    Provider,
    Transport,
}
