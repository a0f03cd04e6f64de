//! Optional saving of completed orchestration results.
//!
//! Saving is fire-and-forget from the session's point of view: the controller spawns the
//! save after completion and only logs a failure.

use crate::error::PersistenceError;
use crate::graph::GraphArtifact;
use crate::session::CompletedRun;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

pub const RESULT_DATA_TYPE: &str = "auto_orchestrate";
const NAME_COMMAND_CHARS: usize = 50;

/// The record sent to the save-result endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResult {
    pub data_name: String,
    pub description: String,
    pub data_type: String,
    pub data_content: serde_json::Value,
    pub number_of_agents: usize,
}

impl SavedResult {
    pub fn from_run(run: &CompletedRun) -> Self {
        let number_of_agents = run.graph.agent_count();
        let command: String = run.command.chars().take(NAME_COMMAND_CHARS).collect();
        Self {
            data_name: format!("Auto-Orchestrate: {}", command),
            description: format!("Auto-orchestrated workflow with {} agents", number_of_agents),
            data_type: RESULT_DATA_TYPE.to_string(),
            data_content: run.final_data.clone(),
            number_of_agents,
        }
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save(&self, run: &CompletedRun) -> Result<(), PersistenceError>;
}

/// POSTs a [`SavedResult`] as JSON.
pub struct HttpSink {
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ResultSink for HttpSink {
    async fn save(&self, run: &CompletedRun) -> Result<(), PersistenceError> {
        let record = SavedResult::from_run(run);
        let response = self
            .client
            .post(&self.url)
            .json(&record)
            .send()
            .await
            .map_err(|e| PersistenceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PersistenceError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Writes each completed graph to a file as a [`GraphArtifact`].
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn save(&self, run: &CompletedRun) -> Result<(), PersistenceError> {
        let bytes = GraphArtifact::new(&run.command, &run.graph).to_bytes()?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            PersistenceError::Io(format!("'{}': {}", self.path.display(), e))
        })
    }
}
