use super::{AgentConnection, AgentGraph, ProcessedAgent};
use crate::error::ArtifactError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};

/// A portable snapshot of a completed orchestration graph.
///
/// Agents are stored sorted by name so identical graphs encode to identical bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GraphArtifact {
    pub command: String,
    pub agents: Vec<ProcessedAgent>,
    pub connections: Vec<AgentConnection>,
}

impl GraphArtifact {
    pub fn new(command: &str, graph: &AgentGraph) -> Self {
        Self {
            command: command.to_string(),
            agents: graph.sorted_agents().into_iter().cloned().collect(),
            connections: graph.connections.clone(),
        }
    }

    pub fn into_graph(self) -> AgentGraph {
        AgentGraph {
            agents: self
                .agents
                .into_iter()
                .map(|agent| (agent.name.clone(), agent))
                .collect(),
            connections: self.connections,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        encode_to_vec(self, standard())
            .map_err(|e| ArtifactError::Generic(format!("Serialization failed: {}", e)))
    }

    /// Saves the artifact to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let mut file = fs::File::create(path).map_err(|e| {
            ArtifactError::Generic(format!("Could not create file '{}': {}", path, e))
        })?;
        file.write_all(&bytes).map_err(|e| {
            ArtifactError::Generic(format!("Could not write to file '{}': {}", path, e))
        })?;
        Ok(())
    }

    /// Loads an artifact from a file.
    pub fn from_file(path: &str) -> Result<Self, ArtifactError> {
        let mut file = fs::File::open(path).map_err(|e| {
            ArtifactError::Generic(format!("Could not open file '{}': {}", path, e))
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            ArtifactError::Generic(format!("Could not read from file '{}': {}", path, e))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        decode_from_slice(bytes, standard())
            .map(|(artifact, _)| artifact) // bincode 2 returns (data, bytes_read)
            .map_err(|e| ArtifactError::Generic(format!("Deserialization failed: {}", e)))
    }
}
