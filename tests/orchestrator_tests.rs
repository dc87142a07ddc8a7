//! End-to-end session tests over a scripted provider.

mod common;

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::*;
use elicit_relay::error::RelayError;
use elicit_relay::orchestrator::OutboundEvent;
use elicit_relay::service::{collect_events, Relay};
use elicit_relay::tools::ExecutorOutput;
use elicit_relay::types::{FinishReason, ModelMessage, Role, StreamChunk, ToolCallFragment};

/// Drive a session, answering each elicitation with the next entry of `answers`.
///
/// `None` cancels the elicitation instead of answering it.
async fn run_answering(relay: &Relay, prompt: &str, answers: Vec<Option<Value>>) -> Vec<OutboundEvent> {
    let mut answers = answers.into_iter();
    let mut stream = relay.stream_chat(vec![ModelMessage::user(prompt)]);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event.expect("session failed");
        if let OutboundEvent::ElicitationRequest { elicitation_id, .. } = &event {
            match answers.next().expect("unexpected elicitation") {
                Some(answer) => relay.respond(elicitation_id.as_str(), answer).unwrap(),
                None => relay.cancel_elicitation(elicitation_id.as_str()).unwrap(),
            }
        }
        events.push(event);
    }
    events
}

fn tool_result(events: &[OutboundEvent]) -> &Value {
    events
        .iter()
        .find_map(|event| match event {
            OutboundEvent::ToolResult { result, .. } => Some(result),
            _ => None,
        })
        .expect("no tool_result event")
}

#[tokio::test]
async fn plain_completion_streams_deltas_then_ends() {
    let provider = ScriptedProvider::new();
    provider.queue_text(&["Hel", "lo"]);
    let relay = meeting_relay(provider.clone());

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Hi")])).await;

    assert!(error.is_none());
    assert_eq!(kinds(&events), vec!["completion_delta", "completion_delta", "stream_end"]);
    assert_eq!(text_of(&events), "Hello");

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let tools = requests[0].tools.as_ref().expect("tools offered");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"schedule_meeting"));
}

#[tokio::test]
async fn tool_call_with_all_arguments_needs_no_elicitation() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[(
        "call_1",
        "schedule_meeting",
        r#"{"title":"Sync","participants":["Alice Chen"],"duration":"30 minutes","preferred_time":"Monday 10:00 AM"}"#,
    )]);
    provider.queue_text(&["Done."]);
    let relay = meeting_relay(provider.clone());

    let events = run_answering(&relay, "Schedule a sync", vec![]).await;

    assert_eq!(
        kinds(&events),
        vec!["tool_started", "tool_result", "completion_delta", "stream_end"]
    );
    let result = tool_result(&events);
    assert_eq!(result["success"], true);
    assert_eq!(result["title"], "Sync");
    assert_eq!(result["scheduled_time"], "Monday 10:00 AM");

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].has_tools());
    let history = &requests[1].messages;
    let assistant = &history[history.len() - 2];
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.tool_calls()[0].id, "call_1");
    let tool_message = history.last().unwrap();
    let part = tool_message.tool_result_part().expect("tool result message");
    assert_eq!(part.tool_call_id, "call_1");
    assert_eq!(part.result["title"], "Sync");
}

#[tokio::test]
async fn missing_arguments_are_elicited_in_order() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    provider.queue_text(&["Scheduled!"]);
    let relay = meeting_relay(provider.clone());

    let events = run_answering(
        &relay,
        "Schedule a meeting",
        vec![
            Some(json!({"action": "accept", "content": {"value": "Planning"}})),
            Some(json!({"action": "accept", "content": {"value": ["Alice Chen", "Bob Smith"]}})),
            Some(json!("45 minutes")),
            Some(json!({"action": "accept", "content": {"value": "Tuesday 09:00 AM"}})),
        ],
    )
    .await;

    assert_eq!(
        kinds(&events),
        vec![
            "tool_started",
            "elicitation_request",
            "elicitation_request",
            "elicitation_request",
            "elicitation_request",
            "tool_result",
            "completion_delta",
            "stream_end",
        ]
    );
    let prompts: Vec<(&str, Option<usize>)> = events
        .iter()
        .filter_map(|event| match event {
            OutboundEvent::ElicitationRequest { message, options, .. } => {
                Some((message.as_str(), options.as_ref().map(Vec::len)))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        prompts,
        vec![
            ("What should the meeting be called?", None),
            ("Who should attend this meeting?", Some(4)),
            ("How long should the meeting be?", Some(6)),
            ("When would you like to schedule this meeting?", Some(6)),
        ]
    );

    let result = tool_result(&events);
    assert_eq!(result["success"], true);
    assert_eq!(result["title"], "Planning");
    assert_eq!(result["participants"], json!(["Alice Chen", "Bob Smith"]));
    assert_eq!(result["duration"], "45 minutes");
    assert_eq!(result["scheduled_time"], "Tuesday 09:00 AM");
    assert_eq!(text_of(&events), "Scheduled!");
    assert!(events.last().unwrap().is_terminal());
    assert!(relay.pending_elicitations().is_empty());
}

#[tokio::test]
async fn cancel_action_stops_the_tool() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", r#"{"title":"Sync"}"#)]);
    provider.queue_text(&["No problem."]);
    let relay = meeting_relay(provider);

    let events = run_answering(&relay, "Schedule a sync", vec![Some(json!({"action": "cancel"}))]).await;

    let result = tool_result(&events);
    assert_eq!(result["success"], false);
    assert_eq!(result["message"], "Meeting scheduling cancelled by user.");
    assert_eq!(kinds(&events).last().unwrap(), "stream_end");
}

#[tokio::test]
async fn cancelling_a_later_elicitation_ends_the_tool() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    provider.queue_text(&["Maybe later."]);
    let relay = meeting_relay(provider);

    let events = run_answering(
        &relay,
        "Schedule",
        vec![Some(json!({"action": "accept", "content": {"value": "Sync"}})), None],
    )
    .await;

    assert_eq!(
        kinds(&events),
        vec![
            "tool_started",
            "elicitation_request",
            "elicitation_request",
            "tool_result",
            "completion_delta",
            "stream_end",
        ]
    );
    let result = tool_result(&events);
    assert_eq!(result["success"], false);
    assert!(result["message"].as_str().unwrap().contains("cancelled"));
    assert!(relay.pending_elicitations().is_empty());
}

#[tokio::test]
async fn text_before_tool_call_streams_first() {
    let provider = ScriptedProvider::new();
    provider.queue(Turn::Chunks(vec![
        Ok(StreamChunk::text("Let me")),
        Ok(StreamChunk::text(" check.")),
        Ok(StreamChunk::tool_call(ToolCallFragment::start(0, "call_1", "lookup"))),
        Ok(StreamChunk::tool_call(ToolCallFragment::arguments(0, r#"{"q":"#))),
        Ok(StreamChunk::tool_call(ToolCallFragment::arguments(0, r#""x"}"#))),
        Ok(StreamChunk::finished(FinishReason::ToolCalls)),
    ]));
    provider.queue_text(&["Found it."]);
    let executor = RecordingExecutor::new(ExecutorOutput::structured(json!({"found": true})));
    let relay = relay_with(provider.clone(), executor.clone(), 300);

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Look")])).await;

    assert!(error.is_none());
    assert_eq!(
        kinds(&events),
        vec![
            "completion_delta",
            "completion_delta",
            "tool_started",
            "tool_result",
            "completion_delta",
            "stream_end",
        ]
    );
    assert_eq!(text_of(&events), "Let me check.Found it.");
    assert_eq!(executor.calls.lock().unwrap()[0].1["q"], "x");

    let follow_up = &provider.requests()[1].messages;
    let assistant = &follow_up[follow_up.len() - 2];
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.text(), "Let me check.");
    assert_eq!(assistant.tool_calls()[0].id, "call_1");
}

#[tokio::test]
async fn explicit_cancellation_reaches_the_tool_as_cancel() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    provider.queue_text(&["Okay."]);
    let relay = meeting_relay(provider);

    let events = run_answering(&relay, "Schedule", vec![None]).await;

    assert_eq!(tool_result(&events)["success"], false);
    assert!(matches!(
        relay.respond("chat_gone_1", json!("late")),
        Err(RelayError::ElicitationNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn unanswered_elicitation_times_out_as_cancel() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    provider.queue_text(&["Timed out."]);
    let relay = relay_with(
        provider,
        Arc::new(elicit_relay::tools::LocalToolExecutor::with_meeting_tools()),
        2,
    );

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Schedule")])).await;

    assert!(error.is_none());
    assert_eq!(
        kinds(&events),
        vec!["tool_started", "elicitation_request", "tool_result", "completion_delta", "stream_end"]
    );
    assert_eq!(tool_result(&events)["success"], false);
    assert!(relay.pending_elicitations().is_empty());
}

#[tokio::test]
async fn malformed_arguments_become_an_empty_object() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "lookup", "{not json")]);
    provider.queue_text(&["ok"]);
    let executor = RecordingExecutor::new(ExecutorOutput::structured(json!({"found": true})));
    let relay = relay_with(provider, executor.clone(), 300);

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Look")])).await;

    assert!(error.is_none());
    assert_eq!(
        events[0],
        OutboundEvent::ToolStarted {
            name: "lookup".into(),
            args: json!({}),
        }
    );
    let calls = executor.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.is_empty());
    assert_eq!(tool_result(&events), &json!({"found": true}));
}

#[tokio::test]
async fn text_output_falls_back_to_result_wrapper() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "lookup", "{}")]);
    provider.queue_text(&["ok"]);
    let executor = RecordingExecutor::new(ExecutorOutput::text("plain words"));
    let relay = relay_with(provider, executor, 300);

    let (events, _) = collect_events(relay.stream_chat(vec![ModelMessage::user("Look")])).await;

    assert_eq!(tool_result(&events), &json!({"result": "plain words"}));
}

#[tokio::test]
async fn multiple_calls_run_in_order() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_a", "lookup", r#"{"q":"a"}"#), ("call_b", "lookup", r#"{"q":"b"}"#)]);
    provider.queue_text(&["both"]);
    let executor = RecordingExecutor::new(ExecutorOutput::structured(json!({"ok": true})));
    let relay = relay_with(provider.clone(), executor.clone(), 300);

    let (events, _) = collect_events(relay.stream_chat(vec![ModelMessage::user("Look twice")])).await;

    assert_eq!(
        kinds(&events),
        vec!["tool_started", "tool_result", "tool_started", "tool_result", "completion_delta", "stream_end"]
    );
    let calls = executor.calls.lock().unwrap();
    assert_eq!(calls[0].1["q"], "a");
    assert_eq!(calls[1].1["q"], "b");

    let follow_up = &provider.requests()[1].messages;
    let ids: Vec<&str> = follow_up
        .iter()
        .filter_map(|m| m.tool_result_part())
        .map(|part| part.tool_call_id.as_str())
        .collect();
    assert_eq!(ids, vec!["call_a", "call_b"]);
}

#[tokio::test]
async fn unreachable_executor_yields_error_result_not_failure() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    provider.queue_text(&["Sorry."]);
    let relay = relay_with(provider.clone(), Arc::new(UnreachableExecutor), 300);

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Schedule")])).await;

    assert!(error.is_none());
    let result = tool_result(&events);
    assert!(result["error"].as_str().unwrap().contains("connection refused"));
    assert!(provider.requests()[0].tools.is_none());
    assert_eq!(kinds(&events).last().unwrap(), "stream_end");
}

#[tokio::test]
async fn provider_failure_ends_without_stream_end() {
    let provider = ScriptedProvider::new();
    provider.queue(Turn::Fail(RelayError::api(500, "upstream down")));
    let relay = meeting_relay(provider);

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Hi")])).await;

    assert!(events.is_empty());
    assert!(matches!(error, Some(RelayError::Api { status: 500, .. })));
}

#[tokio::test]
async fn mid_stream_failure_keeps_earlier_deltas() {
    let provider = ScriptedProvider::new();
    provider.queue(Turn::Chunks(vec![
        Ok(StreamChunk::text("Par")),
        Err(RelayError::Stream("connection reset".into())),
    ]));
    let relay = meeting_relay(provider);

    let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Hi")])).await;

    assert_eq!(events, vec![OutboundEvent::delta("Par")]);
    assert!(matches!(error, Some(RelayError::Stream(_))));
}

#[tokio::test]
async fn system_prompt_is_prepended_once() {
    let provider = ScriptedProvider::new();
    provider.queue_text(&["a"]);
    provider.queue_text(&["b"]);
    let relay = Relay::new(
        provider.clone(),
        Arc::new(elicit_relay::tools::LocalToolExecutor::with_meeting_tools()),
        &elicit_relay::config::RelayConfig::default(),
    );

    collect_events(relay.stream_chat(vec![ModelMessage::user("Hi")])).await;
    collect_events(relay.stream_chat(vec![ModelMessage::system("Be brief."), ModelMessage::user("Hi")])).await;

    let requests = provider.requests();
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert!(requests[0].messages[0].text().contains("schedule_meeting"));
    assert_eq!(requests[1].messages[0].text(), "Be brief.");
    assert_eq!(requests[1].messages.len(), 2);
}

#[tokio::test]
async fn frames_end_with_done() {
    let provider = ScriptedProvider::new();
    provider.queue_text(&["Hi"]);
    let relay = meeting_relay(provider);

    let frames: Vec<String> = relay
        .stream_frames(vec![ModelMessage::user("Hi")])
        .map(|frame| frame.unwrap())
        .collect()
        .await;

    assert_eq!(frames, vec![r#"{"type":"completion_delta","content":"Hi"}"#.to_string(), "[DONE]".into()]);
}

#[tokio::test]
async fn shutdown_cancels_pending_elicitations() {
    let provider = ScriptedProvider::new();
    provider.queue_tool_calls(&[("call_1", "schedule_meeting", "{}")]);
    let relay = meeting_relay(provider);

    let session = tokio::spawn(collect_events(relay.stream_chat(vec![ModelMessage::user("Schedule")])));
    next_pending(&relay).await;
    relay.shutdown();

    let (events, error) = session.await.unwrap();
    assert!(error.is_none());
    assert!(!events.iter().any(OutboundEvent::is_terminal));
    assert!(relay.is_shut_down());
    assert!(relay.pending_elicitations().is_empty());
}
