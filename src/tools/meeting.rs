//! Meeting scheduling tools.
//!
//! `schedule_meeting` fills in whatever the model left out by asking the
//! user, one field at a time.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::executor::ElicitationAction;
use super::local::LocalToolExecutor;
use super::tool::{FnTool, Tool, ToolContext};
use super::types::ToolParameters;
use crate::error::RelayError;

/// A person who can be invited.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Participant {
    pub id: &'static str,
    pub name: &'static str,
    pub email: &'static str,
}

pub const PARTICIPANTS: [Participant; 4] = [
    Participant { id: "1", name: "Alice Chen", email: "alice@example.com" },
    Participant { id: "2", name: "Bob Smith", email: "bob@example.com" },
    Participant { id: "3", name: "Carol White", email: "carol@example.com" },
    Participant { id: "4", name: "David Brown", email: "david@example.com" },
];

pub const DURATIONS: [&str; 6] = [
    "15 minutes",
    "30 minutes",
    "45 minutes",
    "1 hour",
    "1.5 hours",
    "2 hours",
];

const SLOT_HOURS: [u32; 6] = [9, 10, 11, 14, 15, 16];
const SLOT_DAYS: i64 = 3;
const SLOT_COUNT: usize = 6;

const DEFAULT_TITLE: &str = "Untitled Meeting";
const DEFAULT_DURATION: &str = "30 minutes";
const FALLBACK_SLOT: &str = "Tomorrow 10:00 AM";
const CANCELLED_MESSAGE: &str = "Meeting scheduling cancelled by user.";

/// Outcome of a scheduling attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeetingResult {
    pub success: bool,
    pub meeting_id: Option<String>,
    pub title: String,
    pub participants: Vec<String>,
    pub duration: String,
    pub scheduled_time: String,
    pub message: String,
}

impl MeetingResult {
    fn cancelled(draft: MeetingDraft) -> Self {
        Self {
            success: false,
            meeting_id: None,
            title: draft.title.unwrap_or_default(),
            participants: draft.participants.unwrap_or_default(),
            duration: draft.duration.unwrap_or_default(),
            scheduled_time: draft.preferred_time.unwrap_or_default(),
            message: CANCELLED_MESSAGE.to_string(),
        }
    }
}

/// Fields collected so far. Empty strings and lists count as missing.
#[derive(Debug, Clone, Default)]
struct MeetingDraft {
    title: Option<String>,
    participants: Option<Vec<String>>,
    duration: Option<String>,
    preferred_time: Option<String>,
}

impl MeetingDraft {
    fn from_args(args: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            args.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            title: text("title"),
            participants: args.get("participants").map(string_list).filter(|p| !p.is_empty()),
            duration: text("duration"),
            preferred_time: text("preferred_time"),
        }
    }
}

/// Generate up to `count` upcoming working-hour slots, e.g. "Monday 10:00 AM".
pub fn time_slots_from(now: NaiveDateTime, count: usize) -> Vec<String> {
    (0..SLOT_DAYS)
        .map(|offset| (now + Duration::days(offset)).date())
        .flat_map(|day| SLOT_HOURS.iter().filter_map(move |&hour| day.and_hms_opt(hour, 0, 0)))
        .filter(|slot| *slot > now)
        .take(count)
        .map(|slot| slot.format("%A %I:%M %p").to_string())
        .collect()
}

pub fn available_time_slots() -> Vec<String> {
    time_slots_from(Local::now().naive_local(), SLOT_COUNT)
}

/// Schedules a meeting, eliciting any missing detail.
#[derive(Debug)]
pub struct ScheduleMeetingTool {
    parameters: ToolParameters,
}

impl ScheduleMeetingTool {
    pub fn new() -> Self {
        Self {
            parameters: ToolParameters::object()
                .string("title", "Meeting title", false)
                .string_array("participants", "List of participant names", false)
                .string("duration", "Meeting duration", false)
                .string("preferred_time", "Preferred time slot", false)
                .build(),
        }
    }

    async fn schedule(&self, mut draft: MeetingDraft, ctx: &ToolContext) -> MeetingResult {
        if draft.title.is_none() {
            let schema = ToolParameters::object().string("value", "Meeting title", true).build();
            let answer = ctx.elicit("What should the meeting be called?", Some(schema.schema)).await;
            let Some(content) = proceed(answer) else {
                return MeetingResult::cancelled(draft);
            };
            draft.title = Some(answered_text(content.as_ref(), "title").unwrap_or_else(|| DEFAULT_TITLE.into()));
        }

        if draft.participants.is_none() {
            let names: Vec<&str> = PARTICIPANTS.iter().map(|p| p.name).collect();
            let schema = ToolParameters::object()
                .multi_select("value", "Participants", &names, true)
                .build();
            let answer = ctx.elicit("Who should attend this meeting?", Some(schema.schema)).await;
            let Some(content) = proceed(answer) else {
                return MeetingResult::cancelled(draft);
            };
            let selected = content
                .as_ref()
                .map(|c| answered_field(c, "participants"))
                .map(string_list)
                .unwrap_or_default();
            draft.participants = Some(selected);
        }

        if draft.duration.is_none() {
            let schema = ToolParameters::object()
                .string_enum("value", "Duration", &DURATIONS, true)
                .build();
            let answer = ctx.elicit("How long should the meeting be?", Some(schema.schema)).await;
            let Some(content) = proceed(answer) else {
                return MeetingResult::cancelled(draft);
            };
            draft.duration =
                Some(answered_text(content.as_ref(), "duration").unwrap_or_else(|| DEFAULT_DURATION.into()));
        }

        if draft.preferred_time.is_none() {
            let slots = available_time_slots();
            let slot_refs: Vec<&str> = slots.iter().map(String::as_str).collect();
            let schema = ToolParameters::object()
                .string_enum("value", "Time slot", &slot_refs, true)
                .build();
            let answer = ctx
                .elicit("When would you like to schedule this meeting?", Some(schema.schema))
                .await;
            let Some(content) = proceed(answer) else {
                return MeetingResult::cancelled(draft);
            };
            let fallback = slots.first().map(String::as_str).unwrap_or(FALLBACK_SLOT);
            draft.preferred_time =
                Some(answered_text(content.as_ref(), "preferred_time").unwrap_or_else(|| fallback.into()));
        }

        let title = draft.title.unwrap_or_else(|| DEFAULT_TITLE.into());
        let participants = draft.participants.unwrap_or_default();
        let duration = draft.duration.unwrap_or_else(|| DEFAULT_DURATION.into());
        let scheduled_time = draft.preferred_time.unwrap_or_else(|| FALLBACK_SLOT.into());
        let message = format!(
            "Meeting '{title}' scheduled successfully for {scheduled_time} with {} participant(s).",
            participants.len()
        );
        let meeting_id = format!("MTG-{}", Local::now().format("%Y%m%d%H%M%S"));
        info!(%meeting_id, %title, "meeting scheduled");

        MeetingResult {
            success: true,
            meeting_id: Some(meeting_id),
            title,
            participants,
            duration,
            scheduled_time,
            message,
        }
    }
}

impl Default for ScheduleMeetingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScheduleMeetingTool {
    fn name(&self) -> &str {
        "schedule_meeting"
    }

    fn description(&self) -> &str {
        "Schedule a meeting with participants. Missing details are requested from the user."
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<Value, RelayError> {
        let result = self.schedule(MeetingDraft::from_args(&args), ctx).await;
        Ok(serde_json::to_value(result)?)
    }
}

/// Lists everyone who can be invited.
pub fn list_participants_tool() -> FnTool {
    FnTool::new(
        "list_participants",
        "List all available participants for meetings.",
        ToolParameters::empty(),
        |_args, _ctx| async move { serde_json::to_value(PARTICIPANTS).map_err(RelayError::from) },
    )
}

/// Add both meeting tools to `executor`.
pub fn register(executor: LocalToolExecutor) -> LocalToolExecutor {
    executor
        .with_tool(ScheduleMeetingTool::new())
        .with_tool(list_participants_tool())
}

/// `None` stops scheduling; only an explicit cancel does that. A decline
/// carries no content and falls back to defaults.
fn proceed(action: ElicitationAction) -> Option<Option<Value>> {
    match action {
        ElicitationAction::Cancel => None,
        ElicitationAction::Decline => Some(None),
        ElicitationAction::Accept { content } => Some(content),
    }
}

/// The answer under `value`, then under `key`, else the content itself.
fn answered_field<'a>(content: &'a Value, key: &str) -> &'a Value {
    match content {
        Value::Object(map) => map
            .get("value")
            .filter(|v| !is_blank(v))
            .or_else(|| map.get(key))
            .unwrap_or(&Value::Null),
        other => other,
    }
}

fn answered_text(content: Option<&Value>, key: &str) -> Option<String> {
    content
        .map(|c| answered_field(c, key))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
