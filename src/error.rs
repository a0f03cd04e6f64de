use thiserror::Error;

/// Errors that can occur while decoding a single streamed message.
///
/// Decode failures are per-message: the session drops the message and keeps streaming.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Failed to parse stream payload as JSON: {message} (payload: '{raw}')")]
    InvalidJson { raw: String, message: String },

    #[error("Stream payload has no 'event' discriminator (payload: '{raw}')")]
    MissingEvent { raw: String },

    #[error("Event '{event}' is missing required field '{field}' (payload: '{raw}')")]
    MissingField {
        event: String,
        field: String,
        raw: String,
    },
}

impl DecodeError {
    /// The raw payload that failed to decode.
    pub fn raw(&self) -> &str {
        match self {
            DecodeError::InvalidJson { raw, .. }
            | DecodeError::MissingEvent { raw }
            | DecodeError::MissingField { raw, .. } => raw,
        }
    }
}

/// Errors raised by the transport carrying the event stream. Fatal to the current session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to connect to orchestration endpoint: {0}")]
    Connect(String),

    #[error("Orchestration endpoint '{url}' responded with status {status}")]
    Status { status: u16, url: String },

    #[error("Event stream failed: {0}")]
    Stream(String),

    #[error("Event stream ended before the workflow completed")]
    StreamEnded,

    #[error("Giving up after {count} consecutive undecodable messages")]
    DecodeFailures { count: usize },
}

/// Precondition failures of `start`, raised before any transport is opened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("An orchestration command is required")]
    EmptyCommand,
}

/// Errors from the optional save-result collaborator. Logged, never surfaced on the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Save request failed: {0}")]
    Request(String),

    #[error("Save endpoint responded with status {status}")]
    Status { status: u16 },

    #[error("Could not write result: {0}")]
    Io(String),

    #[error("Could not encode result artifact: {0}")]
    Artifact(String),
}

/// Errors that can occur when saving or loading a graph artifact.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Artifact error: {0}")]
    Generic(String),
}

/// Errors that can occur while loading a session configuration file.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config JSON: {0}")]
    Parse(String),
}

impl From<ArtifactError> for PersistenceError {
    fn from(err: ArtifactError) -> Self {
        PersistenceError::Artifact(err.to_string())
    }
}
