//! Streaming session lifecycle.
//!
//! [`SessionMachine`] is the synchronous state machine: it decodes messages, folds progress
//! and builds the graph on completion. [`SessionController`] drives one machine from an
//! async transport, guarding every mutation so a torn-down session can no longer change
//! state.

use crate::error::TransportError;
use crate::graph::{AgentConnection, AgentGraph, ProcessedAgent};
use crate::progress::ProgressState;
use ahash::AHashMap;
use serde::Serialize;

pub mod controller;
pub mod state;

pub use controller::SessionController;
pub use state::{MessageOutcome, SessionMachine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionStatus {
    /// Connecting or streaming.
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Errored | SessionStatus::Cancelled
        )
    }
}

/// A point-in-time copy of a session's observable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub command: Option<String>,
    pub progress: Option<ProgressState>,
    pub agents: Option<AHashMap<String, ProcessedAgent>>,
    pub connections: Option<Vec<AgentConnection>>,
    pub error: Option<TransportError>,
}

impl SessionSnapshot {
    pub fn is_streaming(&self) -> bool {
        self.status.is_active()
    }
}

/// The result of a session that reached `workflow_complete` with a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub command: String,
    pub graph: AgentGraph,
    /// The `auto_orchestrate_response` exactly as received.
    pub final_data: serde_json::Value,
}
