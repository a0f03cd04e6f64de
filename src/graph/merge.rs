use super::{DEFAULT_ROLE, ProcessedAgent};
use crate::event::{AgentSpec, DataFlowEntry};
use ahash::AHashMap;

/// Merges the swarm-spec agent map and the data-flow map into `ProcessedAgent`s.
///
/// Keys are the union of both maps. Role and capabilities come from the agent map, inputs
/// and outputs from the data-flow map; an agent missing from one side keeps defaults for
/// that side's fields.
pub(super) struct AgentMerger<'a> {
    agents: &'a AHashMap<String, AgentSpec>,
    data_flow: &'a AHashMap<String, DataFlowEntry>,
}

impl<'a> AgentMerger<'a> {
    pub(super) fn new(
        agents: &'a AHashMap<String, AgentSpec>,
        data_flow: &'a AHashMap<String, DataFlowEntry>,
    ) -> Self {
        Self { agents, data_flow }
    }

    pub(super) fn merge(&self) -> AHashMap<String, ProcessedAgent> {
        let mut merged: AHashMap<String, ProcessedAgent> =
            AHashMap::with_capacity(self.agents.len().max(self.data_flow.len()));

        for (name, spec) in self.agents {
            let agent = merged
                .entry(name.clone())
                .or_insert_with(|| Self::empty_agent(name));
            if let Some(role) = &spec.role {
                agent.role = role.clone();
            }
            agent.capabilities = spec.capabilities.clone();
        }

        for (name, flow) in self.data_flow {
            let agent = merged
                .entry(name.clone())
                .or_insert_with(|| Self::empty_agent(name));
            agent.inputs = flow.inputs.clone();
            agent.outputs = flow.outputs.clone();
        }

        merged
    }

    fn empty_agent(name: &str) -> ProcessedAgent {
        ProcessedAgent {
            name: name.to_string(),
            role: DEFAULT_ROLE.to_string(),
            capabilities: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}
