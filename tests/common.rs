//! Common test utilities for building swarm specs and stream events.
use ahash::AHashMap;
use serde_json::{Value, json};
use swarmflow::prelude::*;

/// The poet/counter pair: `poet` produces `poem_output`, which `counter` consumes.
#[allow(dead_code)]
pub fn poem_agents() -> AHashMap<String, AgentSpec> {
    let mut agents = AHashMap::new();
    agents.insert(
        "poet".to_string(),
        AgentSpec::new("Creative Writer").with_capabilities(["writing", "rhyming"]),
    );
    agents.insert("counter".to_string(), AgentSpec::new("Word Counter"));
    agents
}

#[allow(dead_code)]
pub fn poem_data_flow() -> AHashMap<String, DataFlowEntry> {
    let mut data_flow = AHashMap::new();
    data_flow.insert(
        "poet".to_string(),
        DataFlowEntry::new(["poem_request"], ["poem_output"]),
    );
    data_flow.insert(
        "counter".to_string(),
        DataFlowEntry::new(["poem_output"], ["word_count"]),
    );
    data_flow
}

/// Builds a data-flow map from `(name, inputs, outputs)` triples.
#[allow(dead_code)]
pub fn data_flow_of(entries: &[(&str, &[&str], &[&str])]) -> AHashMap<String, DataFlowEntry> {
    entries
        .iter()
        .map(|(name, inputs, outputs)| {
            (
                name.to_string(),
                DataFlowEntry::new(inputs.iter().copied(), outputs.iter().copied()),
            )
        })
        .collect()
}

/// The `auto_orchestrate_response` for the poet/counter swarm, as the service sends it.
#[allow(dead_code)]
pub fn poem_response() -> Value {
    json!({
        "swarm_result": {
            "swarm_spec": {
                "agents": {
                    "poet": {
                        "name": "poet",
                        "role": "Creative Writer",
                        "capabilities": ["writing", "rhyming"]
                    },
                    "counter": { "name": "counter", "role": "Word Counter" }
                },
                "execution_plan": {
                    "data_flow": {
                        "poet": { "inputs": ["poem_request"], "outputs": ["poem_output"] },
                        "counter": {
                            "inputs": ["poem_output"],
                            "outputs": ["word_count"],
                            "transform": "count_words"
                        }
                    }
                }
            },
            "execution_results": { "counter": { "word_count": 42 } }
        }
    })
}

#[allow(dead_code)]
pub fn workflow_start() -> String {
    json!({ "event": "workflow_start", "message": "Starting auto-orchestration" }).to_string()
}

#[allow(dead_code)]
pub fn step_start(step: &str) -> String {
    json!({ "event": "step_start", "step": step }).to_string()
}

#[allow(dead_code)]
pub fn progress(percent: u32) -> String {
    json!({ "event": "progress", "progress": percent }).to_string()
}

#[allow(dead_code)]
pub fn step_complete(step: &str) -> String {
    json!({ "event": "step_complete", "step": step, "result": { "ok": true } }).to_string()
}

#[allow(dead_code)]
pub fn workflow_complete(response: Option<Value>) -> String {
    match response {
        Some(response) => {
            json!({ "event": "workflow_complete", "auto_orchestrate_response": response })
        }
        None => json!({ "event": "workflow_complete" }),
    }
    .to_string()
}

/// A full, well-formed run ending in the poet/counter swarm.
#[allow(dead_code)]
pub fn poem_run() -> Vec<String> {
    vec![
        workflow_start(),
        step_start("spec_generation"),
        progress(45),
        step_complete("spec_generation"),
        step_start("execution"),
        progress(80),
        step_complete("execution"),
        workflow_complete(Some(poem_response())),
    ]
}
