use crate::event::{AgentSpec, DataFlowEntry, SwarmSpec};
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod formatter;
mod linker;
mod merge;

pub use artifact::GraphArtifact;
pub use formatter::GraphFormatter;

use linker::ConnectionLinker;
use merge::AgentMerger;

/// Role given to agents that only appear in the data-flow plan.
pub const DEFAULT_ROLE: &str = "Agent";
/// Discriminator written into connections unless overridden.
pub const DEFAULT_CONNECTION_TYPE: &str = "default";
/// Prefix namespacing agent names into node identifiers.
pub const AGENT_ID_PREFIX: &str = "agent-";

/// An agent merged from its swarm-spec entry and its data-flow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedAgent {
    pub name: String,
    pub role: String,
    pub capabilities: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl ProcessedAgent {
    /// The namespaced node identifier used as a connection endpoint.
    pub fn node_id(&self) -> String {
        agent_node_id(&self.name)
    }
}

/// A directed data dependency: an output label of `source` is an input label of `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentConnection {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// The label that produced the match.
    pub label: String,
}

/// The reconstructed agent graph of one completed orchestration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGraph {
    pub agents: AHashMap<String, ProcessedAgent>,
    pub connections: Vec<AgentConnection>,
}

impl AgentGraph {
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.connections.is_empty()
    }

    /// Agents ordered by name.
    pub fn sorted_agents(&self) -> Vec<&ProcessedAgent> {
        self.agents
            .values()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }

    /// Connections leaving the named agent.
    pub fn connections_from(&self, agent_name: &str) -> Vec<&AgentConnection> {
        let node_id = agent_node_id(agent_name);
        self.connections
            .iter()
            .filter(|c| c.source == node_id)
            .collect()
    }

    /// Connections entering the named agent.
    pub fn connections_to(&self, agent_name: &str) -> Vec<&AgentConnection> {
        let node_id = agent_node_id(agent_name);
        self.connections
            .iter()
            .filter(|c| c.target == node_id)
            .collect()
    }
}

pub fn agent_node_id(name: &str) -> String {
    format!("{}{}", AGENT_ID_PREFIX, name)
}

pub fn connection_id(source_name: &str, target_name: &str) -> String {
    format!("edge-{}-{}", source_name, target_name)
}

/// Builds an `AgentGraph` from an agent map and a data-flow map.
///
/// Building never fails: either input may be empty, and entries missing fields fall back
/// to empty label lists and the `"Agent"` role.
///
/// # Example
///
/// ```rust
/// use swarmflow::event::{AgentSpec, DataFlowEntry};
/// use swarmflow::graph::GraphBuilder;
/// use ahash::AHashMap;
///
/// let mut agents = AHashMap::new();
/// agents.insert("poet".to_string(), AgentSpec::new("Creative Writer"));
/// agents.insert("counter".to_string(), AgentSpec::new("Word Counter"));
///
/// let mut data_flow = AHashMap::new();
/// data_flow.insert("poet".to_string(), DataFlowEntry::new(["poem_request"], ["poem_output"]));
/// data_flow.insert("counter".to_string(), DataFlowEntry::new(["poem_output"], ["word_count"]));
///
/// let graph = GraphBuilder::new(agents, data_flow).build();
/// assert_eq!(graph.connections.len(), 1);
/// assert_eq!(graph.connections[0].source, "agent-poet");
/// assert_eq!(graph.connections[0].target, "agent-counter");
/// ```
pub struct GraphBuilder {
    agents: AHashMap<String, AgentSpec>,
    data_flow: AHashMap<String, DataFlowEntry>,
    connection_type: String,
    dedup_pairs: bool,
}

impl GraphBuilder {
    pub fn new(
        agents: AHashMap<String, AgentSpec>,
        data_flow: AHashMap<String, DataFlowEntry>,
    ) -> Self {
        Self {
            agents,
            data_flow,
            connection_type: DEFAULT_CONNECTION_TYPE.to_string(),
            dedup_pairs: false,
        }
    }

    pub fn from_swarm_spec(spec: &SwarmSpec) -> Self {
        Self::new(spec.agents.clone(), spec.execution_plan.data_flow.clone())
    }

    /// Overrides the `type` discriminator of every generated connection.
    pub fn with_connection_type(mut self, kind: &str) -> Self {
        self.connection_type = kind.to_string();
        self
    }

    /// When enabled, an ordered agent pair gets at most one connection no matter how many
    /// labels match. Disabled by default: one connection per matching label.
    pub fn with_pair_dedup(mut self, dedup: bool) -> Self {
        self.dedup_pairs = dedup;
        self
    }

    pub fn build(self) -> AgentGraph {
        let agents = AgentMerger::new(&self.agents, &self.data_flow).merge();
        let connections = ConnectionLinker::new(&agents, &self.connection_type)
            .dedup_pairs(self.dedup_pairs)
            .link();

        tracing::debug!(
            agents = agents.len(),
            connections = connections.len(),
            "Built agent graph"
        );

        AgentGraph {
            agents,
            connections,
        }
    }
}

/// Builds a graph with default options. Absent inputs are treated as empty.
pub fn build_agent_graph(
    agents: Option<&AHashMap<String, AgentSpec>>,
    data_flow: Option<&AHashMap<String, DataFlowEntry>>,
) -> AgentGraph {
    GraphBuilder::new(
        agents.cloned().unwrap_or_default(),
        data_flow.cloned().unwrap_or_default(),
    )
    .build()
}
