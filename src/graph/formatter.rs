use super::AgentGraph;
use std::fmt::Write;

/// Formats agent graphs into human-readable text.
pub struct GraphFormatter;

impl GraphFormatter {
    /// Renders every agent (sorted by name) followed by every connection.
    pub fn format_graph(graph: &AgentGraph) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "======== AGENT GRAPH: {} agents, {} connections ========",
            graph.agent_count(),
            graph.connections.len()
        );

        let _ = writeln!(output, "\n--- AGENTS ---");
        for agent in graph.sorted_agents() {
            let _ = writeln!(output, "{:<20} {}", agent.node_id(), agent.role);
            if !agent.capabilities.is_empty() {
                let _ = writeln!(output, "    capabilities: {}", agent.capabilities.join(", "));
            }
            let _ = writeln!(
                output,
                "    in:  [{}]\n    out: [{}]",
                agent.inputs.join(", "),
                agent.outputs.join(", ")
            );
        }

        if !graph.connections.is_empty() {
            let _ = writeln!(output, "\n--- CONNECTIONS ---");
            for connection in &graph.connections {
                let _ = writeln!(
                    output,
                    "{:<20} -> {:<20} ({})",
                    connection.source, connection.target, connection.label
                );
            }
        }

        let _ = writeln!(output, "\n================ END OF GRAPH ================");
        output
    }
}
