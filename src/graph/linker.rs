use super::{AgentConnection, ProcessedAgent, agent_node_id, connection_id};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

/// Derives connections between agents whose output label matches another agent's input.
///
/// Agents are visited in name order so the same agent map always yields the same
/// connection sequence. Self-matches are never linked.
pub(super) struct ConnectionLinker<'a> {
    agents: &'a AHashMap<String, ProcessedAgent>,
    kind: &'a str,
    dedup_pairs: bool,
}

impl<'a> ConnectionLinker<'a> {
    pub(super) fn new(agents: &'a AHashMap<String, ProcessedAgent>, kind: &'a str) -> Self {
        Self {
            agents,
            kind,
            dedup_pairs: false,
        }
    }

    pub(super) fn dedup_pairs(mut self, dedup: bool) -> Self {
        self.dedup_pairs = dedup;
        self
    }

    pub(super) fn link(&self) -> Vec<AgentConnection> {
        let ordered: Vec<&ProcessedAgent> = self
            .agents
            .values()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect();

        let input_sets: AHashMap<&str, AHashSet<&str>> = ordered
            .iter()
            .map(|agent| {
                (
                    agent.name.as_str(),
                    agent.inputs.iter().map(String::as_str).collect(),
                )
            })
            .collect();

        let mut connections = Vec::new();
        for source in &ordered {
            for target in &ordered {
                if source.name == target.name {
                    continue;
                }
                let Some(target_inputs) = input_sets.get(target.name.as_str()) else {
                    continue;
                };

                let matches = source
                    .outputs
                    .iter()
                    .unique()
                    .filter(|label| target_inputs.contains(label.as_str()));

                for label in matches {
                    connections.push(AgentConnection {
                        id: connection_id(&source.name, &target.name),
                        source: agent_node_id(&source.name),
                        target: agent_node_id(&target.name),
                        kind: self.kind.to_string(),
                        label: label.clone(),
                    });
                    if self.dedup_pairs {
                        break;
                    }
                }
            }
        }
        connections
    }
}
