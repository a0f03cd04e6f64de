pub mod decoder;
pub mod payload;

pub use decoder::*;
pub use payload::*;

use std::fmt;

/// The orchestration payload carried by a `workflow_complete` event.
///
/// `raw` is kept verbatim so it can be handed to persistence untouched; `response` is the
/// leniently typed view the graph builder reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPayload {
    pub raw: serde_json::Value,
    pub response: OrchestrationResponse,
}

/// A decoded event from the orchestration stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    WorkflowStart {
        message: Option<String>,
    },
    StepStart {
        step: String,
        message: Option<String>,
    },
    /// `step` is usually omitted upstream; it is inferred from the last `StepStart`.
    Progress {
        step: Option<String>,
        progress: f64,
        message: Option<String>,
    },
    StepComplete {
        step: String,
        result: Option<serde_json::Value>,
    },
    WorkflowComplete {
        payload: Option<CompletionPayload>,
    },
    /// An event kind this crate does not know. Passed through, never an error.
    Unrecognized {
        event: String,
        payload: serde_json::Value,
    },
}

impl StreamEvent {
    /// The wire name of this event's kind.
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::WorkflowStart { .. } => "workflow_start",
            StreamEvent::StepStart { .. } => "step_start",
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::StepComplete { .. } => "step_complete",
            StreamEvent::WorkflowComplete { .. } => "workflow_complete",
            StreamEvent::Unrecognized { event, .. } => event,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::WorkflowComplete { .. })
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::StepStart { step, .. } | StreamEvent::StepComplete { step, .. } => {
                write!(f, "{}({})", self.kind(), step)
            }
            StreamEvent::Progress { progress, .. } => write!(f, "progress({})", progress),
            _ => write!(f, "{}", self.kind()),
        }
    }
}
