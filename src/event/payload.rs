//! Typed views over the `auto_orchestrate_response` carried by `workflow_complete`.
//!
//! The upstream service owns this shape and is not always consistent about it, so every
//! field is read leniently: a value of the wrong type degrades to its default instead of
//! failing the whole payload.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The orchestration payload of a `workflow_complete` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub swarm_result: SwarmResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwarmResult {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub swarm_spec: SwarmSpec,
    /// Carried through untouched; this crate never interprets execution results.
    #[serde(default)]
    pub execution_results: serde_json::Value,
}

/// The full agent-plus-workflow description of one orchestration result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwarmSpec {
    #[serde(default, deserialize_with = "lenient::entries")]
    pub agents: AHashMap<String, AgentSpec>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub execution_plan: ExecutionPlan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    #[serde(default, deserialize_with = "lenient::entries")]
    pub data_flow: AHashMap<String, DataFlowEntry>,
}

/// An agent as described by the upstream swarm spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentSpec {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::labels")]
    pub capabilities: Vec<String>,
}

/// The declared input/output labels of one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataFlowEntry {
    #[serde(default, deserialize_with = "lenient::labels")]
    pub inputs: Vec<String>,
    #[serde(default, deserialize_with = "lenient::labels")]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

impl OrchestrationResponse {
    /// Reads a response out of an arbitrary JSON value. Never fails.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn swarm_spec(&self) -> &SwarmSpec {
        &self.swarm_result.swarm_spec
    }
}

impl AgentSpec {
    pub fn new(role: &str) -> Self {
        Self {
            name: None,
            role: Some(role.to_string()),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }
}

impl DataFlowEntry {
    pub fn new<I, O, S, T>(inputs: I, outputs: O) -> Self
    where
        I: IntoIterator<Item = S>,
        O: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            transform: None,
            filter: None,
        }
    }
}

mod lenient {
    use ahash::AHashMap;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub(super) fn entries<'de, D, T>(deserializer: D) -> Result<AHashMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let entries = match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| (key, serde_json::from_value(value).unwrap_or_default()))
                .collect(),
            _ => AHashMap::new(),
        };
        Ok(entries)
    }

    pub(super) fn labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let labels = match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(labels)
    }

    pub(super) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }
}
