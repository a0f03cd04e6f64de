//! # Swarmflow - Auto-Orchestrate Stream Consumer and Agent Graph Builder
//!
//! **Swarmflow** consumes the server-sent event stream of an "auto-orchestrate" service and
//! reconstructs, from the swarm spec it finally delivers, the directed graph of agents and
//! the data dependencies between them.
//!
//! ## Core Workflow
//!
//! 1.  **Connect**: A [`transport::Connector`] opens the event stream for a free-text command.
//!     [`transport::SseConnector`] talks HTTP; [`transport::ChannelConnector`] is driven in memory.
//! 2.  **Decode**: Each message is decoded by [`event::EventDecoder`] into a [`event::StreamEvent`].
//!     Undecodable messages are dropped without ending the stream.
//! 3.  **Track**: Lifecycle events are folded by [`progress::ProgressTracker`] into the current
//!     step, percent and message.
//! 4.  **Build**: The `workflow_complete` payload is handed to [`graph::GraphBuilder`], which merges
//!     the agent map with the data-flow map and links every agent whose output label is another
//!     agent's input label.
//! 5.  **Observe**: [`session::SessionController`] ties it together and exposes snapshots; an
//!     optional [`persistence::ResultSink`] receives the completed run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use swarmflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::default()
//!         .with_endpoint("http://localhost:8000/api/auto-orchestrate/stream");
//!     let mut controller = SessionController::from_config(config)?;
//!
//!     controller.start("Write a poem and count its words")?;
//!     let snapshot = controller.wait_until_settled().await;
//!
//!     match snapshot.status {
//!         SessionStatus::Completed => {
//!             for connection in snapshot.connections.unwrap_or_default() {
//!                 println!("{} -> {} ({})", connection.source, connection.target, connection.label);
//!             }
//!         }
//!         _ => println!("Session ended: {:?} {:?}", snapshot.status, snapshot.error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The graph builder can also be used on its own:
//!
//! ```rust
//! use swarmflow::prelude::*;
//! use ahash::AHashMap;
//!
//! let mut data_flow = AHashMap::new();
//! data_flow.insert("poet".to_string(), DataFlowEntry::new(["poem_request"], ["poem_output"]));
//! data_flow.insert("counter".to_string(), DataFlowEntry::new(["poem_output"], ["word_count"]));
//!
//! let graph = GraphBuilder::new(AHashMap::new(), data_flow).build();
//! assert_eq!(graph.agents["poet"].role, "Agent");
//! assert_eq!(graph.connections.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod persistence;
pub mod prelude;
pub mod progress;
pub mod session;
pub mod transport;
