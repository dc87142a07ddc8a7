//! Shared test helpers: a scripted provider, scripted executors and a relay builder.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};

use elicit_relay::config::RelayConfig;
use elicit_relay::error::RelayError;
use elicit_relay::orchestrator::OutboundEvent;
use elicit_relay::provider::{ModelProvider, ProviderRequest};
use elicit_relay::service::Relay;
use elicit_relay::tools::{
    ElicitationHook, ExecutorOutput, LocalToolExecutor, ToolExecutor, ToolSchema,
};
use elicit_relay::types::*;

/// One scripted provider turn.
pub enum Turn {
    /// Chunks to stream; an `Err` item ends the stream.
    Chunks(Vec<Result<StreamChunk, RelayError>>),
    /// Fail before streaming.
    Fail(RelayError),
}

/// A provider that replays queued turns and records every request.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a plain text turn split into the given deltas.
    pub fn queue_text(&self, deltas: &[&str]) {
        let mut chunks: Vec<_> = deltas.iter().map(|d| Ok(StreamChunk::text(*d))).collect();
        chunks.push(Ok(StreamChunk::finished(FinishReason::Stop)));
        self.queue(Turn::Chunks(chunks));
    }

    /// Queue a turn that requests one tool call per `(id, name, arguments)`.
    ///
    /// Arguments are streamed in two fragments to exercise accumulation.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, &str)]) {
        let mut chunks = Vec::new();
        for (index, (id, name, arguments)) in calls.iter().enumerate() {
            let index = index as u32;
            chunks.push(Ok(StreamChunk::tool_call(ToolCallFragment::start(index, *id, *name))));
            let split = arguments.len() / 2;
            let split = (split..=arguments.len())
                .find(|i| arguments.is_char_boundary(*i))
                .unwrap_or(arguments.len());
            chunks.push(Ok(StreamChunk::tool_call(ToolCallFragment::arguments(
                index,
                &arguments[..split],
            ))));
            chunks.push(Ok(StreamChunk::tool_call(ToolCallFragment::arguments(
                index,
                &arguments[split..],
            ))));
        }
        chunks.push(Ok(StreamChunk::finished(FinishReason::ToolCalls)));
        self.queue(Turn::Chunks(chunks));
    }

    pub fn queue(&self, turn: Turn) {
        self.turns.lock().unwrap().push_back(turn);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream_completion(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, RelayError>>, RelayError> {
        self.requests.lock().unwrap().push(request.clone());
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Turn::Chunks(chunks)) => Ok(futures::stream::iter(chunks).boxed()),
            Some(Turn::Fail(err)) => Err(err),
            None => Ok(futures::stream::iter(vec![
                Ok(StreamChunk::text("(no scripted turn)")),
                Ok(StreamChunk::finished(FinishReason::Stop)),
            ])
            .boxed()),
        }
    }
}

/// Executor whose every call fails the way an unreachable server would.
pub struct UnreachableExecutor;

#[async_trait]
impl ToolExecutor for UnreachableExecutor {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, RelayError> {
        Err(RelayError::Stream("connection refused".into()))
    }

    async fn call_tool(
        &self,
        _name: &str,
        _arguments: Map<String, Value>,
        _hook: Arc<dyn ElicitationHook>,
    ) -> Result<ExecutorOutput, RelayError> {
        Err(RelayError::Stream("connection refused".into()))
    }
}

/// Executor that returns a fixed output and records each call.
pub struct RecordingExecutor {
    output: ExecutorOutput,
    pub calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl RecordingExecutor {
    pub fn new(output: ExecutorOutput) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, RelayError> {
        Ok(vec![ToolSchema {
            name: "lookup".into(),
            description: "Look something up".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }])
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        _hook: Arc<dyn ElicitationHook>,
    ) -> Result<ExecutorOutput, RelayError> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        Ok(self.output.clone())
    }
}

pub fn test_config() -> RelayConfig {
    RelayConfig {
        openai_api_key: Some("sk-test".into()),
        system_prompt: None,
        ..Default::default()
    }
}

/// A relay over the scripted provider and the in-process meeting tools.
pub fn meeting_relay(provider: Arc<ScriptedProvider>) -> Relay {
    Relay::new(provider, Arc::new(LocalToolExecutor::with_meeting_tools()), &test_config())
}

pub fn relay_with(provider: Arc<ScriptedProvider>, executor: Arc<dyn ToolExecutor>, timeout_secs: u64) -> Relay {
    let config = RelayConfig {
        elicitation_timeout_secs: timeout_secs,
        ..test_config()
    };
    Relay::new(provider, executor, &config)
}

/// Wait until `relay` has an elicitation pending and return its id.
pub async fn next_pending(relay: &Relay) -> String {
    for _ in 0..500 {
        if let Some(request) = relay.pending_elicitations().into_iter().next() {
            return request.id.as_str().to_string();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no elicitation became pending");
}

/// Concatenated text of all completion deltas.
pub fn text_of(events: &[OutboundEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            OutboundEvent::CompletionDelta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

/// The `type` tag of every event, in order.
pub fn kinds(events: &[OutboundEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| serde_json::to_value(event).unwrap()["type"].as_str().unwrap().to_string())
        .collect()
}
