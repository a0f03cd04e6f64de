use crate::error::ConfigError;
use crate::graph::DEFAULT_CONNECTION_TYPE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/auto-orchestrate/stream";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Settings for one `SessionController`.
///
/// Loadable from a JSON file; any field left out takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The streaming orchestration endpoint. The command is sent as `?command=`.
    pub endpoint: String,
    pub connect_timeout_secs: Option<u64>,
    /// Consecutive undecodable messages tolerated before the session fails.
    /// `None` never fails a session over decode errors.
    pub decode_failure_limit: Option<usize>,
    pub connection_type: String,
    pub dedup_connections: bool,
    /// Where completed graphs are POSTed, if anywhere.
    pub save_endpoint: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
            decode_failure_limit: None,
            connection_type: DEFAULT_CONNECTION_TYPE.to_string(),
            dedup_connections: false,
            save_endpoint: None,
        }
    }
}

impl SessionConfig {
    /// Load a session config from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_connect_timeout(mut self, secs: Option<u64>) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_decode_failure_limit(mut self, limit: Option<usize>) -> Self {
        self.decode_failure_limit = limit;
        self
    }

    pub fn with_connection_type(mut self, kind: &str) -> Self {
        self.connection_type = kind.to_string();
        self
    }

    pub fn with_dedup_connections(mut self, dedup: bool) -> Self {
        self.dedup_connections = dedup;
        self
    }

    pub fn with_save_endpoint(mut self, url: Option<String>) -> Self {
        self.save_endpoint = url;
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}
