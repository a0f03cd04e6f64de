use super::{CompletedRun, SessionSnapshot, SessionStatus};
use crate::config::SessionConfig;
use crate::error::{DecodeError, TransportError, ValidationError};
use crate::event::{CompletionPayload, EventDecoder, StreamEvent};
use crate::graph::GraphBuilder;
use crate::progress::ProgressTracker;

/// What handling one inbound message did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// The event was decoded and applied; the session keeps streaming.
    Applied(StreamEvent),
    /// The message could not be decoded and was dropped.
    Dropped(DecodeError),
    /// `workflow_complete` arrived. Carries the run when a graph was built.
    Completed(Option<CompletedRun>),
    /// Too many undecodable messages; the session is now errored.
    Failed(TransportError),
    /// The session is not streaming, so the message was not looked at.
    Ignored,
}

/// The synchronous session state machine.
///
/// `idle -> connecting -> streaming -> {completed | errored | cancelled}`. Terminal states
/// are only left through `begin` or `reset`.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    snapshot: SessionSnapshot,
    tracker: ProgressTracker,
    decode_failures: usize,
    decode_failure_limit: Option<usize>,
    connection_type: String,
    dedup_connections: bool,
}

impl SessionMachine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            snapshot: SessionSnapshot::default(),
            tracker: ProgressTracker::new(),
            decode_failures: 0,
            decode_failure_limit: config.decode_failure_limit,
            connection_type: config.connection_type.clone(),
            dedup_connections: config.dedup_connections,
        }
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot.status
    }

    /// Discards any previous session and enters `connecting` for `command`.
    pub fn begin(&mut self, command: &str) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        self.reset();
        self.snapshot.status = SessionStatus::Connecting;
        self.snapshot.command = Some(command.to_string());
        Ok(())
    }

    /// The transport acknowledged the connection.
    pub fn on_open(&mut self) -> bool {
        if self.snapshot.status != SessionStatus::Connecting {
            return false;
        }
        self.snapshot.status = SessionStatus::Streaming;
        true
    }

    pub fn on_message(&mut self, raw: &str) -> MessageOutcome {
        if self.snapshot.status != SessionStatus::Streaming {
            return MessageOutcome::Ignored;
        }

        let event = match EventDecoder::decode(raw) {
            Ok(event) => event,
            Err(err) => return self.on_decode_failure(err),
        };
        self.decode_failures = 0;

        if ProgressTracker::is_interleaved(self.tracker.state(), &event) {
            tracing::warn!(
                event = %event,
                "Progress reported for a step other than the current one; attributing it to the current step"
            );
        }
        self.tracker.apply(&event);
        self.snapshot.progress = self.tracker.state().cloned();

        match event {
            StreamEvent::WorkflowComplete { payload } => {
                let run = payload.map(|payload| self.build_graph(payload));
                self.snapshot.status = SessionStatus::Completed;
                tracing::info!(
                    agents = run.as_ref().map_or(0, |r| r.graph.agent_count()),
                    "Orchestration workflow completed"
                );
                MessageOutcome::Completed(run)
            }
            event => {
                tracing::debug!(event = %event, "Applied stream event");
                MessageOutcome::Applied(event)
            }
        }
    }

    /// The transport failed. Fatal to an active session.
    pub fn on_transport_error(&mut self, err: TransportError) -> bool {
        if !self.snapshot.status.is_active() {
            return false;
        }
        self.fail(err);
        true
    }

    /// The server closed the stream. Before `workflow_complete` this is an error.
    pub fn on_stream_end(&mut self) -> bool {
        self.on_transport_error(TransportError::StreamEnded)
    }

    /// Cancels an active session. A no-op when idle or already terminal.
    pub fn cancel(&mut self) -> bool {
        if !self.snapshot.status.is_active() {
            return false;
        }
        self.snapshot.status = SessionStatus::Cancelled;
        true
    }

    /// Clears all derived state and returns to `idle`.
    pub fn reset(&mut self) {
        self.snapshot = SessionSnapshot::default();
        self.tracker.clear();
        self.decode_failures = 0;
    }

    fn on_decode_failure(&mut self, err: DecodeError) -> MessageOutcome {
        self.decode_failures += 1;
        match self.decode_failure_limit {
            Some(limit) if self.decode_failures >= limit => {
                let fatal = TransportError::DecodeFailures {
                    count: self.decode_failures,
                };
                self.fail(fatal.clone());
                MessageOutcome::Failed(fatal)
            }
            _ => MessageOutcome::Dropped(err),
        }
    }

    fn fail(&mut self, err: TransportError) {
        tracing::error!(error = %err, "Orchestration session failed");
        self.snapshot.status = SessionStatus::Errored;
        self.snapshot.error = Some(err);
    }

    fn build_graph(&mut self, payload: CompletionPayload) -> CompletedRun {
        let graph = GraphBuilder::from_swarm_spec(payload.response.swarm_spec())
            .with_connection_type(&self.connection_type)
            .with_pair_dedup(self.dedup_connections)
            .build();

        self.snapshot.agents = Some(graph.agents.clone());
        self.snapshot.connections = Some(graph.connections.clone());

        CompletedRun {
            command: self.snapshot.command.clone().unwrap_or_default(),
            graph,
            final_data: payload.raw,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
