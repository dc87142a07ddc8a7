//! Reassembles streamed tool-call fragments into complete calls.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::types::{AgentToolCall, ToolCallFragment};

#[derive(Debug, Clone, Default, PartialEq)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// A tool call assembled from its fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// Parsed argument object; empty when the text was not a JSON object.
    pub arguments: Map<String, Value>,
}

impl PendingToolCall {
    pub fn to_agent_call(&self) -> AgentToolCall {
        AgentToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: Value::Object(self.arguments.clone()),
        }
    }
}

/// Collects fragments keyed by index.
///
/// Argument text concatenates in arrival order. Id and name are taken from
/// the first fragment that carries a non-empty value and never overwritten.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: ToolCallFragment) {
        let call = self.calls.entry(fragment.index).or_default();
        if call.id.is_empty() {
            if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
                call.id = id;
            }
        }
        if call.name.is_empty() {
            if let Some(name) = fragment.name.filter(|name| !name.is_empty()) {
                call.name = name;
            }
        }
        if let Some(arguments) = fragment.arguments {
            call.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Complete calls in ascending index order.
    pub fn finish(self) -> Vec<PendingToolCall> {
        self.calls
            .into_iter()
            .map(|(index, call)| PendingToolCall {
                arguments: parse_arguments(index, &call.name, &call.arguments),
                id: if call.id.is_empty() { format!("call_{index}") } else { call.id },
                name: call.name,
            })
            .collect()
    }
}

fn parse_arguments(index: u32, name: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(index, tool = name, "tool call arguments are not a JSON object; using {{}}");
            Map::new()
        }
    }
}
