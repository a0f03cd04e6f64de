use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmflow::error::PersistenceError;
use swarmflow::prelude::*;
use swarmflow::transport::SseFrameParser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const SAVE_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Streams an auto-orchestrate run and prints the agent graph it produces
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The orchestration command to run
    command: Option<String>,

    /// Streaming endpoint of the orchestration service
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Path to a session config JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Replay a recorded text/event-stream transcript instead of connecting
    #[arg(short, long)]
    replay: Option<String>,

    /// POST the completed result to this URL
    #[arg(long)]
    save_url: Option<String>,

    /// Write the completed graph to this file as a binary artifact
    #[arg(short, long)]
    artifact: Option<String>,

    /// Emit at most one connection per agent pair
    #[arg(long)]
    dedup: bool,

    /// How to print the resulting graph
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Run in interactive mode to be prompted for inputs
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

/// Saves to every configured target and reports back when done, so the CLI can wait for
/// the save before exiting.
struct CliSink {
    http: Option<HttpSink>,
    file: Option<FileSink>,
    done: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl ResultSink for CliSink {
    async fn save(&self, run: &CompletedRun) -> std::result::Result<(), PersistenceError> {
        let mut outcome = Ok(());
        if let Some(file) = &self.file {
            outcome = outcome.and(file.save(run).await);
        }
        if let Some(http) = &self.http {
            outcome = outcome.and(http.save(run).await);
        }
        let _ = self.done.send(());
        outcome
    }
}

#[derive(Serialize)]
struct GraphReport<'a> {
    status: SessionStatus,
    command: Option<&'a str>,
    agents: Vec<&'a ProcessedAgent>,
    connections: &'a [AgentConnection],
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut cli = Cli::parse();
    if cli.human {
        prompt_missing(&mut cli);
    }
    run(cli).await;
}

async fn run(cli: Cli) {
    let total_start = Instant::now();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => SessionConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if cli.save_url.is_some() {
        config = config.with_save_endpoint(cli.save_url.clone());
    }
    if cli.dedup {
        config = config.with_dedup_connections(true);
    }

    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| exit_with_error("An orchestration command is required."));

    let connector: Arc<dyn Connector> = match &cli.replay {
        Some(path) => Arc::new(replay_connector(path)),
        None => Arc::new(
            SseConnector::from_config(&config)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to set up transport: {}", e))),
        ),
    };

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let saving = config.save_endpoint.is_some() || cli.artifact.is_some();
    let mut controller = SessionController::new(config.clone(), connector);
    if saving {
        controller = controller.with_sink(Arc::new(CliSink {
            http: config.save_endpoint.as_deref().map(HttpSink::new),
            file: cli.artifact.as_deref().map(FileSink::new),
            done: done_tx,
        }));
    }

    let mut updates = controller.subscribe();
    controller
        .start(&command)
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));

    println!("Streaming '{}' from {}", command, source_name(&cli, &config));
    let stream_start = Instant::now();
    let mut last_message: Option<String> = None;
    let snapshot = loop {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(progress) = &snapshot.progress {
            if last_message.as_deref() != Some(progress.message.as_str()) {
                println!("  [{:>3}%] {}", progress.progress, progress.message);
                last_message = Some(progress.message.clone());
            }
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        if updates.changed().await.is_err() {
            break controller.snapshot();
        }
    };
    let stream_duration = stream_start.elapsed();

    match snapshot.status {
        SessionStatus::Completed => {}
        SessionStatus::Errored => exit_with_error(&format!(
            "Session failed: {}",
            snapshot
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        )),
        other => exit_with_error(&format!("Session ended in state {:?}", other)),
    }

    let graph = AgentGraph {
        agents: snapshot.agents.clone().unwrap_or_default(),
        connections: snapshot.connections.clone().unwrap_or_default(),
    };
    if snapshot.agents.is_none() {
        println!("Workflow completed without an orchestration payload; no graph was built.");
    }

    match cli.format {
        OutputFormat::Text => println!("\n{}", GraphFormatter::format_graph(&graph)),
        OutputFormat::Json => {
            let report = GraphReport {
                status: snapshot.status,
                command: snapshot.command.as_deref(),
                agents: graph.sorted_agents(),
                connections: &graph.connections,
            };
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to encode graph: {}", e)));
            println!("{}", json);
        }
    }

    if saving && snapshot.agents.is_some() {
        if tokio::time::timeout(SAVE_WAIT, done_rx.recv()).await.is_err() {
            eprintln!("Warning: result save did not finish within {:?}", SAVE_WAIT);
        }
    }

    println!("--- Summary ---");
    println!("Agents:       {}", graph.agent_count());
    println!("Connections:  {}", graph.connections.len());
    println!("Streaming:    {:?}", stream_duration);
    println!("Total:        {:?}", total_start.elapsed());
}

/// Builds an in-memory connector that replays every message of a recorded transcript.
fn replay_connector(path: &str) -> ChannelConnector {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read transcript '{}': {}", path, e))
    });
    let mut parser = SseFrameParser::new();
    let mut messages = parser.push(&bytes);
    messages.extend(parser.finish());

    let connector = ChannelConnector::new();
    connector.replay(messages);
    connector
}

fn source_name(cli: &Cli, config: &SessionConfig) -> String {
    match &cli.replay {
        Some(path) => format!("transcript '{}'", path),
        None => config.endpoint.clone(),
    }
}

/// Prompts for anything interactive mode still needs.
fn prompt_missing(cli: &mut Cli) {
    println!("--- Swarmflow Interactive Mode ---");

    if cli.command.is_none() {
        let command = prompt_for_input("Enter orchestration command", None);
        cli.command = Some(command);
    }
    if cli.endpoint.is_none() && cli.replay.is_none() {
        let replay = prompt_for_input("Replay a transcript file (optional)", Some(""));
        if replay.is_empty() {
            let endpoint = prompt_for_input(
                "Enter streaming endpoint",
                Some(swarmflow::config::DEFAULT_ENDPOINT),
            );
            cli.endpoint = Some(endpoint);
        } else {
            cli.replay = Some(replay);
        }
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = match default {
        Some(d) if !d.is_empty() => format!(" [default: {}]", d),
        _ => String::new(),
    };

    print!("> {}{}: ", prompt_text, default_prompt);
    let _ = io::stdout().flush();

    if let Err(e) = io::stdin().read_line(&mut line) {
        exit_with_error(&format!("Failed to read input: {}", e));
    }
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
