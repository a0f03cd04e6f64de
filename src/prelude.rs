//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the swarmflow crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use swarmflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let raw = std::fs::read_to_string("path/to/workflow_complete.json")?;
//! if let StreamEvent::WorkflowComplete { payload: Some(payload) } = EventDecoder::decode(&raw)? {
//!     let graph = GraphBuilder::from_swarm_spec(payload.response.swarm_spec()).build();
//!     println!("{}", GraphFormatter::format_graph(&graph));
//! }
//! # Ok(())
//! # }
//! ```

// Streaming session
pub use crate::config::SessionConfig;
pub use crate::session::{
    CompletedRun, MessageOutcome, SessionController, SessionMachine, SessionSnapshot,
    SessionStatus,
};

// Events and progress
pub use crate::event::{
    AgentSpec, CompletionPayload, DataFlowEntry, EventDecoder, OrchestrationResponse,
    StreamEvent, SwarmSpec,
};
pub use crate::progress::{ProgressState, ProgressTracker};

// Graph building
pub use crate::graph::{
    AgentConnection, AgentGraph, GraphArtifact, GraphBuilder, GraphFormatter, ProcessedAgent,
    build_agent_graph,
};

// Transports and persistence
pub use crate::persistence::{FileSink, HttpSink, ResultSink, SavedResult};
pub use crate::transport::{ChannelConnector, ChannelFeed, Connector, SseConnector};

// Error types
pub use crate::error::{
    ArtifactError, ConfigError, DecodeError, PersistenceError, TransportError, ValidationError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
