//! Tests for the session state machine and the async session controller.
mod common;
use async_trait::async_trait;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use swarmflow::prelude::*;
use tokio::sync::{mpsc, watch};

const WAIT: Duration = Duration::from_secs(5);

fn streaming_machine(config: &SessionConfig) -> SessionMachine {
    let mut machine = SessionMachine::new(config);
    machine.begin("write a poem").unwrap();
    assert!(machine.on_open());
    machine
}

/// Waits until a published snapshot satisfies `ready`.
async fn settle_on(
    updates: &mut watch::Receiver<SessionSnapshot>,
    ready: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(WAIT, updates.wait_for(ready))
        .await
        .expect("Timed out waiting for session state")
        .expect("Session controller dropped")
        .clone()
}

async fn settled(controller: &SessionController) -> SessionSnapshot {
    tokio::time::timeout(WAIT, controller.wait_until_settled())
        .await
        .expect("Timed out waiting for session to settle")
}

/// Lets spawned tasks run so that anything that would wrongly mutate state gets the chance.
async fn let_tasks_run() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// --- SessionMachine ---

#[test]
fn test_begin_rejects_empty_command() {
    let mut machine = SessionMachine::default();
    assert_eq!(machine.begin("   "), Err(ValidationError::EmptyCommand));
    assert_eq!(machine.status(), SessionStatus::Idle);
    assert!(machine.snapshot().command.is_none());
}

#[test]
fn test_open_moves_connecting_to_streaming() {
    let mut machine = SessionMachine::default();
    machine.begin("write a poem").unwrap();
    assert_eq!(machine.status(), SessionStatus::Connecting);
    assert!(machine.snapshot().is_streaming());

    // Nothing is decoded before the transport acknowledges the connection.
    assert_eq!(
        machine.on_message(&step_start("planning")),
        MessageOutcome::Ignored
    );

    assert!(machine.on_open());
    assert_eq!(machine.status(), SessionStatus::Streaming);
    assert!(!machine.on_open());
}

#[test]
fn test_undecodable_message_is_dropped_and_stream_continues() {
    let mut machine = streaming_machine(&SessionConfig::default());

    let outcome = machine.on_message("{not json");
    assert!(matches!(
        outcome,
        MessageOutcome::Dropped(DecodeError::InvalidJson { .. })
    ));
    assert_eq!(machine.status(), SessionStatus::Streaming);
    assert!(machine.snapshot().error.is_none());

    let outcome = machine.on_message(&step_start("spec_generation"));
    assert!(matches!(outcome, MessageOutcome::Applied(StreamEvent::StepStart { .. })));
    assert_eq!(
        machine.snapshot().progress.as_ref().map(|p| p.step.as_str()),
        Some("spec_generation")
    );
}

#[test]
fn test_decode_failure_limit_fails_session() {
    let config = SessionConfig::default().with_decode_failure_limit(Some(2));
    let mut machine = streaming_machine(&config);

    // A good message in between resets the count.
    assert!(matches!(machine.on_message("garbage"), MessageOutcome::Dropped(_)));
    assert!(matches!(
        machine.on_message(&step_start("planning")),
        MessageOutcome::Applied(_)
    ));
    assert!(matches!(machine.on_message("garbage"), MessageOutcome::Dropped(_)));
    assert_eq!(machine.status(), SessionStatus::Streaming);

    let outcome = machine.on_message("more garbage");
    assert_eq!(
        outcome,
        MessageOutcome::Failed(TransportError::DecodeFailures { count: 2 })
    );
    assert_eq!(machine.status(), SessionStatus::Errored);
    assert_eq!(
        machine.snapshot().error,
        Some(TransportError::DecodeFailures { count: 2 })
    );
}

#[test]
fn test_completion_builds_graph() {
    let mut machine = streaming_machine(&SessionConfig::default());

    let mut outcomes: Vec<MessageOutcome> =
        poem_run().iter().map(|raw| machine.on_message(raw)).collect();

    let Some(MessageOutcome::Completed(Some(run))) = outcomes.pop() else {
        panic!("Expected the last message to complete the session");
    };
    assert!(outcomes.iter().all(|o| matches!(o, MessageOutcome::Applied(_))));

    assert_eq!(run.command, "write a poem");
    assert_eq!(run.final_data, poem_response());
    assert_eq!(run.graph.agent_count(), 2);
    assert_eq!(run.graph.connections.len(), 1);

    let snapshot = machine.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.agents.as_ref(), Some(&run.graph.agents));
    assert_eq!(snapshot.connections.as_ref(), Some(&run.graph.connections));
    let current = snapshot.progress.as_ref().unwrap();
    assert_eq!(current.step, "execution");
    assert_eq!(current.progress, 100.0);

    // Terminal: later messages and stream closure change nothing.
    assert_eq!(machine.on_message(&progress(10)), MessageOutcome::Ignored);
    assert!(!machine.on_stream_end());
    assert_eq!(machine.status(), SessionStatus::Completed);
}

#[test]
fn test_completion_without_payload_builds_no_graph() {
    let mut machine = streaming_machine(&SessionConfig::default());
    machine.on_message(&step_start("execution"));

    let outcome = machine.on_message(&workflow_complete(None));
    assert_eq!(outcome, MessageOutcome::Completed(None));
    assert_eq!(machine.status(), SessionStatus::Completed);
    assert!(machine.snapshot().agents.is_none());
    assert!(machine.snapshot().connections.is_none());
    assert_eq!(
        machine.snapshot().progress.as_ref().map(|p| p.step.as_str()),
        Some("execution")
    );
}

#[test]
fn test_graph_honors_config() {
    let config = SessionConfig::default().with_connection_type("smoothstep");
    let mut machine = streaming_machine(&config);

    let MessageOutcome::Completed(Some(run)) =
        machine.on_message(&workflow_complete(Some(poem_response())))
    else {
        panic!("Expected a completed run");
    };
    assert!(run.graph.connections.iter().all(|c| c.kind == "smoothstep"));
}

#[test]
fn test_stream_end_before_completion_is_error() {
    let mut machine = streaming_machine(&SessionConfig::default());
    machine.on_message(&step_start("planning"));

    assert!(machine.on_stream_end());
    assert_eq!(machine.status(), SessionStatus::Errored);
    assert_eq!(machine.snapshot().error, Some(TransportError::StreamEnded));
    // Progress is kept for display.
    assert!(machine.snapshot().progress.is_some());
}

#[test]
fn test_cancel_only_affects_active_sessions() {
    let mut machine = SessionMachine::default();
    assert!(!machine.cancel());
    assert_eq!(machine.status(), SessionStatus::Idle);

    let mut machine = streaming_machine(&SessionConfig::default());
    assert!(machine.cancel());
    assert_eq!(machine.status(), SessionStatus::Cancelled);
    assert_eq!(
        machine.on_message(&step_start("planning")),
        MessageOutcome::Ignored
    );
    assert!(!machine.on_transport_error(TransportError::Stream("late".to_string())));
    assert!(machine.snapshot().error.is_none());
}

#[test]
fn test_reset_clears_everything() {
    let mut machine = streaming_machine(&SessionConfig::default());
    for raw in poem_run() {
        machine.on_message(&raw);
    }

    machine.reset();
    assert_eq!(machine.snapshot(), &SessionSnapshot::default());

    // Progress starts over on the next session.
    machine.begin("again").unwrap();
    machine.on_open();
    machine.on_message(&progress(10));
    assert_eq!(machine.snapshot().progress.as_ref().unwrap().step, "");
}

#[test]
fn test_begin_from_terminal_states_starts_fresh() {
    let config = SessionConfig::default();

    let mut completed = streaming_machine(&config);
    for raw in poem_run() {
        completed.on_message(&raw);
    }
    let mut errored = streaming_machine(&config);
    errored.on_message(&step_start("planning"));
    errored.on_stream_end();
    let mut cancelled = streaming_machine(&config);
    cancelled.on_message(&step_start("planning"));
    cancelled.cancel();

    for mut machine in [completed, errored, cancelled] {
        assert!(machine.status().is_terminal());
        machine.begin("again").unwrap();

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Connecting);
        assert_eq!(snapshot.command.as_deref(), Some("again"));
        assert!(snapshot.progress.is_none());
        assert!(snapshot.agents.is_none());
        assert!(snapshot.connections.is_none());
        assert!(snapshot.error.is_none());
    }
}

// --- SessionController ---

struct RecordingSink {
    calls: mpsc::UnboundedSender<CompletedRun>,
    fail: bool,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn save(&self, run: &CompletedRun) -> std::result::Result<(), PersistenceError> {
        let _ = self.calls.send(run.clone());
        if self.fail {
            Err(PersistenceError::Status { status: 500 })
        } else {
            Ok(())
        }
    }
}

fn recording_sink(fail: bool) -> (Arc<RecordingSink>, mpsc::UnboundedReceiver<CompletedRun>) {
    let (calls, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingSink { calls, fail }), rx)
}

#[tokio::test]
async fn test_start_connects_then_streams() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector.clone());
    let mut updates = controller.subscribe();

    controller.start("write a poem").unwrap();
    assert_eq!(controller.status(), SessionStatus::Connecting);
    assert!(controller.is_streaming());
    assert!(controller.error().is_none());
    assert!(controller.agents().is_none());

    assert!(feed.accept());
    settle_on(&mut updates, |s| s.status == SessionStatus::Streaming).await;
    assert_eq!(connector.commands(), vec!["write a poem"]);

    feed.send(&step_start("spec_generation"));
    feed.send(&progress(45));
    let snapshot = settle_on(&mut updates, |s| {
        s.progress.as_ref().is_some_and(|p| p.progress == 45.0)
    })
    .await;
    assert_eq!(
        snapshot.progress.unwrap().message,
        "Processing spec_generation... 45%"
    );
    assert!(controller.is_streaming());
}

#[tokio::test]
async fn test_full_run_completes_with_graph() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    let snapshot = settled(&controller).await;

    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert!(!controller.is_streaming());
    assert_eq!(snapshot.command.as_deref(), Some("write a poem"));

    let agents = controller.agents().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents["counter"].inputs, vec!["poem_output"]);

    let connections = controller.connections().unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].source, "agent-poet");
    assert_eq!(connections[0].target, "agent-counter");

    assert_eq!(controller.progress().unwrap().progress, 100.0);
}

#[tokio::test]
async fn test_undecodable_message_does_not_end_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut messages = vec!["data that is not json".to_string()];
    messages.extend(poem_run());
    connector.replay(messages);
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    let snapshot = settled(&controller).await;
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_stop_cancels_and_ignores_later_messages() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);
    let mut updates = controller.subscribe();

    controller.start("write a poem").unwrap();
    feed.accept();
    feed.send(&step_start("planning"));
    settle_on(&mut updates, |s| s.progress.is_some()).await;

    controller.stop();
    assert_eq!(controller.status(), SessionStatus::Cancelled);
    assert!(!controller.is_streaming());

    feed.send(&progress(50));
    feed.send(&workflow_complete(Some(poem_response())));
    let_tasks_run().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Cancelled);
    assert_eq!(snapshot.progress.unwrap().progress, 0.0);
    assert!(snapshot.agents.is_none());
    assert!(snapshot.error.is_none());

    // Stopping again is a no-op.
    controller.stop();
    assert_eq!(controller.status(), SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_restart_tears_down_previous_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut first = connector.open_session();
    let mut second = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector.clone());
    let mut updates = controller.subscribe();

    controller.start("first").unwrap();
    first.accept();
    settle_on(&mut updates, |s| s.status == SessionStatus::Streaming).await;

    controller.start("second").unwrap();
    assert_eq!(controller.status(), SessionStatus::Connecting);
    assert_eq!(controller.snapshot().command.as_deref(), Some("second"));
    assert!(controller.progress().is_none());

    first.send(&step_start("stale"));
    second.accept();
    second.send(&step_start("fresh"));
    settle_on(&mut updates, |s| s.progress.is_some()).await;
    let_tasks_run().await;

    assert_eq!(controller.progress().unwrap().step, "fresh");
    assert_eq!(controller.status(), SessionStatus::Streaming);
    assert_eq!(connector.commands(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_empty_command_never_connects() {
    let connector = Arc::new(ChannelConnector::new());
    let mut controller = SessionController::new(SessionConfig::default(), connector.clone());

    assert_eq!(controller.start(""), Err(ValidationError::EmptyCommand));
    let_tasks_run().await;
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn test_transport_failure_errors_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    feed.accept();
    feed.send(&step_start("planning"));
    feed.fail(TransportError::Stream("connection reset".to_string()));

    let snapshot = settled(&controller).await;
    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert_eq!(
        controller.error(),
        Some(TransportError::Stream("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_refused_connection_errors_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    let refusal = TransportError::Status {
        status: 502,
        url: "http://orchestrator/stream".to_string(),
    };
    feed.refuse(refusal.clone());

    let snapshot = settled(&controller).await;
    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert_eq!(snapshot.error, Some(refusal));
    assert!(snapshot.progress.is_none());
}

#[tokio::test]
async fn test_stream_closed_early_errors_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    feed.accept();
    feed.send(&step_start("planning"));
    feed.close();

    let snapshot = settled(&controller).await;
    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert_eq!(snapshot.error, Some(TransportError::StreamEnded));
}

#[tokio::test]
async fn test_completed_run_is_saved() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let (sink, mut saved) = recording_sink(false);
    let mut controller =
        SessionController::new(SessionConfig::default(), connector).with_sink(sink);

    controller.start("write a poem").unwrap();
    settled(&controller).await;

    let run = tokio::time::timeout(WAIT, saved.recv())
        .await
        .expect("Timed out waiting for save")
        .unwrap();
    assert_eq!(run.command, "write a poem");
    assert_eq!(run.final_data, poem_response());
    assert_eq!(SavedResult::from_run(&run).number_of_agents, 2);
}

#[tokio::test]
async fn test_failed_save_does_not_affect_session() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let (sink, mut saved) = recording_sink(true);
    let mut controller =
        SessionController::new(SessionConfig::default(), connector).with_sink(sink);

    controller.start("write a poem").unwrap();
    settled(&controller).await;
    tokio::time::timeout(WAIT, saved.recv())
        .await
        .expect("Timed out waiting for save");
    let_tasks_run().await;

    assert_eq!(controller.status(), SessionStatus::Completed);
    assert!(controller.error().is_none());
    assert!(controller.agents().is_some());
}

#[tokio::test]
async fn test_completion_without_payload_skips_save() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(vec![step_start("execution"), workflow_complete(None)]);
    let (sink, mut saved) = recording_sink(false);
    let mut controller =
        SessionController::new(SessionConfig::default(), connector).with_sink(sink);

    controller.start("write a poem").unwrap();
    let snapshot = settled(&controller).await;
    let_tasks_run().await;

    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert!(snapshot.agents.is_none());
    assert!(saved.try_recv().is_err());
}

#[tokio::test]
async fn test_file_sink_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.graph");
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let mut controller = SessionController::new(SessionConfig::default(), connector)
        .with_sink(Arc::new(FileSink::new(&path)));

    controller.start("write a poem").unwrap();
    settled(&controller).await;

    let path = path.to_str().unwrap();
    let artifact = tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(artifact) = GraphArtifact::from_file(path) {
                return artifact;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for artifact");

    assert_eq!(artifact.command, "write a poem");
    let expected = AgentGraph {
        agents: controller.agents().unwrap(),
        connections: controller.connections().unwrap(),
    };
    assert_eq!(artifact.into_graph(), expected);
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("write a poem").unwrap();
    settled(&controller).await;

    controller.reset();
    assert_eq!(controller.snapshot(), SessionSnapshot::default());
    assert!(controller.progress().is_none());
    assert!(controller.connections().is_none());
}

#[test]
fn test_idle_controller_is_already_settled() {
    let controller = SessionController::new(
        SessionConfig::default(),
        Arc::new(ChannelConnector::new()),
    );
    let snapshot = tokio_test::block_on(controller.wait_until_settled());
    assert_eq!(snapshot.status, SessionStatus::Idle);
}

/// Restarts `controller` on a fresh feed and checks nothing from the previous session survives.
async fn assert_restart_is_clean(controller: &mut SessionController, mut feed: ChannelFeed) {
    let mut updates = controller.subscribe();
    controller.start("second").unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connecting);
    assert_eq!(snapshot.command.as_deref(), Some("second"));
    assert!(snapshot.progress.is_none());
    assert!(snapshot.agents.is_none());
    assert!(snapshot.connections.is_none());
    assert!(snapshot.error.is_none());

    feed.accept();
    feed.send(&step_start("fresh"));
    settle_on(&mut updates, |s| s.progress.is_some()).await;
    let_tasks_run().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Streaming);
    assert_eq!(snapshot.progress.unwrap().step, "fresh");
    assert!(snapshot.agents.is_none());
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_restart_after_completion() {
    let connector = Arc::new(ChannelConnector::new());
    connector.replay(poem_run());
    let next = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector.clone());

    controller.start("first").unwrap();
    assert_eq!(settled(&controller).await.status, SessionStatus::Completed);
    assert!(controller.agents().is_some());

    assert_restart_is_clean(&mut controller, next).await;
    assert_eq!(connector.commands(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_restart_after_error() {
    let connector = Arc::new(ChannelConnector::new());
    let mut first = connector.open_session();
    let next = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);

    controller.start("first").unwrap();
    first.accept();
    first.send(&step_start("planning"));
    first.fail(TransportError::Stream("connection reset".to_string()));
    assert_eq!(settled(&controller).await.status, SessionStatus::Errored);

    assert_restart_is_clean(&mut controller, next).await;
}

#[tokio::test]
async fn test_restart_after_cancel() {
    let connector = Arc::new(ChannelConnector::new());
    let mut first = connector.open_session();
    let next = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);
    let mut updates = controller.subscribe();

    controller.start("first").unwrap();
    first.accept();
    first.send(&step_start("planning"));
    settle_on(&mut updates, |s| s.progress.is_some()).await;
    controller.stop();
    assert_eq!(controller.status(), SessionStatus::Cancelled);

    assert_restart_is_clean(&mut controller, next).await;
    // The cancelled session's feed no longer reaches anything.
    assert!(!first.send(&step_start("stale")));
    let_tasks_run().await;
    assert_eq!(controller.progress().unwrap().step, "fresh");
}

#[tokio::test]
async fn test_empty_command_keeps_active_session() {
    let connector = Arc::new(ChannelConnector::new());
    let mut feed = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector.clone());
    let mut updates = controller.subscribe();

    controller.start("write a poem").unwrap();
    feed.accept();
    settle_on(&mut updates, |s| s.status == SessionStatus::Streaming).await;

    assert_eq!(controller.start("  "), Err(ValidationError::EmptyCommand));
    assert_eq!(controller.status(), SessionStatus::Streaming);
    assert_eq!(controller.snapshot().command.as_deref(), Some("write a poem"));

    assert!(feed.send(&step_start("planning")));
    let snapshot = settle_on(&mut updates, |s| s.progress.is_some()).await;
    assert_eq!(snapshot.progress.unwrap().step, "planning");
    assert_eq!(connector.commands(), vec!["write a poem"]);
}

#[tokio::test]
async fn test_stop_and_reset_release_transport() {
    let connector = Arc::new(ChannelConnector::new());
    let mut stopped = connector.open_session();
    let mut reset = connector.open_session();
    let mut controller = SessionController::new(SessionConfig::default(), connector);
    let mut updates = controller.subscribe();

    controller.start("first").unwrap();
    stopped.accept();
    settle_on(&mut updates, |s| s.status == SessionStatus::Streaming).await;
    controller.stop();
    let_tasks_run().await;
    assert!(!stopped.send(&progress(10)));

    controller.start("second").unwrap();
    reset.accept();
    settle_on(&mut updates, |s| s.status == SessionStatus::Streaming).await;
    controller.reset();
    let_tasks_run().await;
    assert!(!reset.send(&progress(10)));
    assert_eq!(controller.status(), SessionStatus::Idle);
}
