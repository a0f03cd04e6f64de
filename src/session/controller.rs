use super::{CompletedRun, MessageOutcome, SessionMachine, SessionSnapshot, SessionStatus};
use crate::config::SessionConfig;
use crate::error::{TransportError, ValidationError};
use crate::graph::{AgentConnection, ProcessedAgent};
use crate::persistence::{HttpSink, ResultSink};
use crate::progress::ProgressState;
use crate::transport::{Connector, SseConnector};
use ahash::AHashMap;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Shared {
    /// Bumped whenever a session is started, stopped or reset. Handlers carry the
    /// generation they were spawned with and become inert once it moves on.
    generation: u64,
    machine: SessionMachine,
    updates: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn publish(&self) {
        self.updates.send_replace(self.machine.snapshot().clone());
    }
}

/// Owns one auto-orchestrate streaming session at a time.
///
/// `start` must be called from within a Tokio runtime: the session runs on a spawned task
/// that owns the transport. Readers observe snapshots, either by polling the accessors or
/// through [`SessionController::subscribe`].
///
/// # Example
///
/// ```rust,no_run
/// use swarmflow::prelude::*;
///
/// # async fn run() -> Result<()> {
/// let config = SessionConfig::default().with_endpoint("http://localhost:8000/stream");
/// let mut controller = SessionController::from_config(config)?;
///
/// controller.start("Write a poem and count its words")?;
/// let snapshot = controller.wait_until_settled().await;
///
/// if let Some(connections) = snapshot.connections {
///     println!("{} connections", connections.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionController {
    connector: Arc<dyn Connector>,
    sink: Option<Arc<dyn ResultSink>>,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let machine = SessionMachine::new(&config);
        let (updates, _) = watch::channel(machine.snapshot().clone());
        Self {
            connector,
            sink: None,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                machine,
                updates,
            })),
            task: None,
        }
    }

    /// A controller streaming over SSE, saving over HTTP when `save_endpoint` is set.
    pub fn from_config(config: SessionConfig) -> Result<Self, TransportError> {
        let connector = Arc::new(SseConnector::from_config(&config)?);
        let sink = config
            .save_endpoint
            .as_deref()
            .map(|url| Arc::new(HttpSink::new(url)) as Arc<dyn ResultSink>);

        let mut controller = Self::new(config, connector);
        controller.sink = sink;
        Ok(controller)
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts a session for `command`, tearing down any previous one first.
    pub fn start(&mut self, command: &str) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        self.abort_task();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.machine.begin(command)?;
            shared.publish();
            shared.generation
        };

        tracing::info!(command, generation, "Starting auto-orchestrate session");
        self.task = Some(tokio::spawn(drive(
            Arc::clone(&self.shared),
            generation,
            Arc::clone(&self.connector),
            self.sink.clone(),
            command.to_string(),
        )));
        Ok(())
    }

    /// Cancels the active session and closes its transport. A no-op otherwise.
    ///
    /// State is frozen before this returns. The transport itself is dropped by the aborted
    /// task the next time the runtime polls it, which closes the connection.
    pub fn stop(&mut self) {
        let cancelled = {
            let mut shared = lock(&self.shared);
            let cancelled = shared.machine.cancel();
            if cancelled {
                shared.generation += 1;
                shared.publish();
            }
            cancelled
        };
        if cancelled {
            tracing::info!("Auto-orchestrate session cancelled");
            self.abort_task();
        }
    }

    /// Closes any open transport and clears all session state.
    ///
    /// As with [`SessionController::stop`], the transport is released once the runtime polls
    /// the aborted task; no message it delivers after this call is applied.
    pub fn reset(&mut self) {
        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.machine.reset();
            shared.publish();
        }
        self.abort_task();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.shared).machine.snapshot().clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.shared).machine.status()
    }

    pub fn is_streaming(&self) -> bool {
        self.status().is_active()
    }

    pub fn error(&self) -> Option<TransportError> {
        lock(&self.shared).machine.snapshot().error.clone()
    }

    pub fn agents(&self) -> Option<AHashMap<String, ProcessedAgent>> {
        lock(&self.shared).machine.snapshot().agents.clone()
    }

    pub fn connections(&self) -> Option<Vec<AgentConnection>> {
        lock(&self.shared).machine.snapshot().connections.clone()
    }

    pub fn progress(&self) -> Option<ProgressState> {
        lock(&self.shared).machine.snapshot().progress.clone()
    }

    /// A receiver notified with a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        lock(&self.shared).updates.subscribe()
    }

    /// Waits until the session is no longer connecting or streaming.
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        let mut updates = self.subscribe();
        match updates.wait_for(|snapshot| !snapshot.status.is_active()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.abort_task();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` against the machine only if `generation` is still current, then publishes.
fn with_live<T>(
    shared: &Mutex<Shared>,
    generation: u64,
    f: impl FnOnce(&mut SessionMachine) -> T,
) -> Option<T> {
    let mut guard = lock(shared);
    if guard.generation != generation {
        return None;
    }
    let out = f(&mut guard.machine);
    guard.publish();
    Some(out)
}

async fn drive(
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    connector: Arc<dyn Connector>,
    sink: Option<Arc<dyn ResultSink>>,
    command: String,
) {
    let mut stream = match connector.connect(&command).await {
        Ok(stream) => stream,
        Err(err) => {
            with_live(&shared, generation, |machine| {
                machine.on_transport_error(err)
            });
            return;
        }
    };

    if with_live(&shared, generation, SessionMachine::on_open).is_none() {
        return;
    }

    while let Some(item) = stream.next().await {
        let outcome = match item {
            Ok(raw) => with_live(&shared, generation, |machine| machine.on_message(&raw)),
            Err(err) => {
                with_live(&shared, generation, |machine| {
                    machine.on_transport_error(err)
                });
                return;
            }
        };

        match outcome {
            Some(MessageOutcome::Applied(_)) => {}
            Some(MessageOutcome::Dropped(err)) => {
                tracing::warn!(error = %err, "Dropping undecodable stream message");
            }
            Some(MessageOutcome::Completed(run)) => {
                if let (Some(run), Some(sink)) = (run, sink) {
                    spawn_save(sink, run);
                }
                return;
            }
            Some(MessageOutcome::Failed(_)) | Some(MessageOutcome::Ignored) | None => return,
        }
    }

    with_live(&shared, generation, SessionMachine::on_stream_end);
}

fn spawn_save(sink: Arc<dyn ResultSink>, run: CompletedRun) {
    tokio::spawn(async move {
        match sink.save(&run).await {
            Ok(()) => tracing::info!(
                agents = run.graph.agent_count(),
                "Saved orchestration result"
            ),
            Err(err) => tracing::warn!(error = %err, "Failed to save orchestration result"),
        }
    });
}
