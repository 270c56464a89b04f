//! Inbound event model.
//!
//! Every frame on the wire is `{"type": <kind>, "data": {...}}`. The kind is
//! classified first; the payload is then decoded into the struct for that
//! kind. Kinds this client does not know become [`ServerEvent::Unknown`].
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::browser::BrowserStatus;
use crate::task_tree::TaskStatus;
use crate::ParseError;

/// Tag of every server event kind the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskStarted,
    Action,
    BrowserAction,
    TaskComplete,
    TaskCancelled,
    TaskError,
    StatusUpdate,
    TaskProgress,
    BrowserClosed,
    AgentLog,
    BrowserThought,
    BrowserSummary,
    BrowserStep,
    AssistantThinking,
    AssistantMessageChunk,
    AssistantMessageComplete,
    AssistantError,
    ResearchPlanCreated,
    ResearchTaskStarted,
    ResearchTaskProgress,
    ResearchTaskCompleted,
    ResearchReportReady,
    StepRecord,
    CustomTaskComplete,
    DataExportReady,
    DataExtracted,
    FileCreated,
}

impl EventKind {
    pub const ALL: [EventKind; 27] = [
        EventKind::TaskStarted,
        EventKind::Action,
        EventKind::BrowserAction,
        EventKind::TaskComplete,
        EventKind::TaskCancelled,
        EventKind::TaskError,
        EventKind::StatusUpdate,
        EventKind::TaskProgress,
        EventKind::BrowserClosed,
        EventKind::AgentLog,
        EventKind::BrowserThought,
        EventKind::BrowserSummary,
        EventKind::BrowserStep,
        EventKind::AssistantThinking,
        EventKind::AssistantMessageChunk,
        EventKind::AssistantMessageComplete,
        EventKind::AssistantError,
        EventKind::ResearchPlanCreated,
        EventKind::ResearchTaskStarted,
        EventKind::ResearchTaskProgress,
        EventKind::ResearchTaskCompleted,
        EventKind::ResearchReportReady,
        EventKind::StepRecord,
        EventKind::CustomTaskComplete,
        EventKind::DataExportReady,
        EventKind::DataExtracted,
        EventKind::FileCreated,
    ];

    /// Wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskStarted => "task_started",
            EventKind::Action => "action",
            EventKind::BrowserAction => "browser_action",
            EventKind::TaskComplete => "task_complete",
            EventKind::TaskCancelled => "task_cancelled",
            EventKind::TaskError => "task_error",
            EventKind::StatusUpdate => "status_update",
            EventKind::TaskProgress => "task_progress",
            EventKind::BrowserClosed => "browser_closed",
            EventKind::AgentLog => "agent_log",
            EventKind::BrowserThought => "browser_thought",
            EventKind::BrowserSummary => "browser_summary",
            EventKind::BrowserStep => "browser_step",
            EventKind::AssistantThinking => "assistant_thinking",
            EventKind::AssistantMessageChunk => "assistant_message_chunk",
            EventKind::AssistantMessageComplete => "assistant_message_complete",
            EventKind::AssistantError => "assistant_error",
            EventKind::ResearchPlanCreated => "research.plan_created",
            EventKind::ResearchTaskStarted => "research.task_started",
            EventKind::ResearchTaskProgress => "research.task_progress",
            EventKind::ResearchTaskCompleted => "research.task_completed",
            EventKind::ResearchReportReady => "research.report_ready",
            EventKind::StepRecord => "step_record",
            EventKind::CustomTaskComplete => "custom_task_complete",
            EventKind::DataExportReady => "data_export_ready",
            EventKind::DataExtracted => "data_extracted",
            EventKind::FileCreated => "file_created",
        }
    }

    pub fn from_tag(tag: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle payload shared by started/complete/cancelled/error.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TaskNotice {
    #[serde(alias = "taskId")]
    pub task_id: Option<String>,
    pub task: Option<String>,
    pub message: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskNotice {
    /// Result text when present, falling back to the free-form message.
    pub fn outcome_text(&self) -> Option<String> {
        match &self.result {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
            Some(Value::Null) | None => self.message.clone(),
            Some(Value::String(_)) => self.message.clone(),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BrowserActionEvent {
    pub action: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "message")]
    pub description: Option<String>,
    pub details: Option<Value>,
}

impl BrowserActionEvent {
    pub fn describe(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        match (&self.action, &self.url) {
            (Some(action), Some(url)) => format!("{action} {url}"),
            (Some(action), None) => action.clone(),
            (None, Some(url)) => format!("navigate {url}"),
            (None, None) => "browser action".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TaskProgressEvent {
    #[serde(alias = "taskId")]
    pub task_id: Option<String>,
    pub step: Option<u32>,
    #[serde(alias = "totalSteps")]
    pub total_steps: Option<u32>,
    pub message: Option<String>,
}

impl TaskProgressEvent {
    pub fn describe(&self) -> String {
        let steps = match (self.step, self.total_steps) {
            (Some(step), Some(total)) => format!("step {step}/{total}"),
            (Some(step), None) => format!("step {step}"),
            _ => "progress".to_string(),
        };
        match &self.message {
            Some(message) => format!("{steps}: {message}"),
            None => steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Notice {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AgentLogEvent {
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct BrowserThoughtEvent {
    #[serde(default, alias = "content", alias = "message")]
    pub thought: String,
    pub step: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct BrowserSummaryEvent {
    #[serde(default, alias = "content", alias = "message")]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct BrowserStepEvent {
    #[serde(alias = "step_number", alias = "stepNumber")]
    pub step: Option<u32>,
    pub action: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "description", alias = "next_goal")]
    pub goal: Option<String>,
}

impl BrowserStepEvent {
    pub fn describe(&self) -> String {
        let what = self
            .goal
            .as_deref()
            .or(self.action.as_deref())
            .unwrap_or("working");
        match self.step {
            Some(step) => format!("Step {step}: {what}"),
            None => format!("Step: {what}"),
        }
    }
}

/// Streaming assistant payload; used by thinking, chunk and complete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AssistantText {
    #[serde(alias = "chunk", alias = "message")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AssistantErrorEvent {
    #[serde(default, alias = "message")]
    pub error: String,
}

/// A task inside a plan is either bare text or an object with a description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PlanTaskSpec {
    Text(String),
    Detailed { description: String },
}

impl PlanTaskSpec {
    pub fn description(&self) -> &str {
        match self {
            PlanTaskSpec::Text(text) => text,
            PlanTaskSpec::Detailed { description } => description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanCategory {
    #[serde(alias = "category")]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<PlanTaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ResearchPlan {
    #[serde(default, alias = "categories")]
    pub plan: Vec<PlanCategory>,
}

impl ResearchPlan {
    pub fn task_count(&self) -> usize {
        self.plan.iter().map(|category| category.tasks.len()).sum()
    }
}

/// Lifecycle update for one research task addressed by index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchTaskUpdate {
    #[serde(alias = "categoryIndex")]
    pub category_index: usize,
    #[serde(alias = "taskIndex")]
    pub task_index: usize,
    pub message: Option<String>,
    pub status: Option<TaskStatus>,
    pub success: Option<bool>,
    pub results: Option<Value>,
    pub error: Option<String>,
}

impl ResearchTaskUpdate {
    /// Terminal status carried by a completion event.
    pub fn terminal_status(&self) -> TaskStatus {
        if let Some(status) = self.status {
            return status;
        }
        if self.error.is_some() || self.success == Some(false) {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ResearchReport {
    #[serde(default, alias = "content")]
    pub report: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StepRecordEvent {
    pub step: Option<u32>,
    pub action: Option<String>,
    pub url: Option<String>,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DataExportNotice {
    pub filename: Option<String>,
    #[serde(alias = "itemCount")]
    pub item_count: Option<u64>,
    pub preview: Option<Value>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DataExtractedEvent {
    #[serde(alias = "itemCount")]
    pub item_count: Option<u64>,
    pub preview: Option<Value>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FileCreatedEvent {
    #[serde(default, alias = "name")]
    pub filename: String,
    pub path: Option<String>,
}

/// One decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    TaskStarted(TaskNotice),
    Action(BrowserActionEvent),
    BrowserAction(BrowserActionEvent),
    TaskComplete(TaskNotice),
    TaskCancelled(TaskNotice),
    TaskError(TaskNotice),
    StatusUpdate(BrowserStatus),
    TaskProgress(TaskProgressEvent),
    BrowserClosed(Notice),
    AgentLog(AgentLogEvent),
    BrowserThought(BrowserThoughtEvent),
    BrowserSummary(BrowserSummaryEvent),
    BrowserStep(BrowserStepEvent),
    AssistantThinking(AssistantText),
    AssistantMessageChunk(AssistantText),
    AssistantMessageComplete(AssistantText),
    AssistantError(AssistantErrorEvent),
    ResearchPlanCreated(ResearchPlan),
    ResearchTaskStarted(ResearchTaskUpdate),
    ResearchTaskProgress(ResearchTaskUpdate),
    ResearchTaskCompleted(ResearchTaskUpdate),
    ResearchReportReady(ResearchReport),
    StepRecord(StepRecordEvent),
    CustomTaskComplete(TaskNotice),
    DataExportReady(DataExportNotice),
    DataExtracted(DataExtractedEvent),
    FileCreated(FileCreatedEvent),
    /// A kind this client does not know; kept for forward compatibility.
    Unknown { kind: String },
}

impl ServerEvent {
    /// Kind of a known event; `None` for [`ServerEvent::Unknown`].
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            ServerEvent::TaskStarted(_) => EventKind::TaskStarted,
            ServerEvent::Action(_) => EventKind::Action,
            ServerEvent::BrowserAction(_) => EventKind::BrowserAction,
            ServerEvent::TaskComplete(_) => EventKind::TaskComplete,
            ServerEvent::TaskCancelled(_) => EventKind::TaskCancelled,
            ServerEvent::TaskError(_) => EventKind::TaskError,
            ServerEvent::StatusUpdate(_) => EventKind::StatusUpdate,
            ServerEvent::TaskProgress(_) => EventKind::TaskProgress,
            ServerEvent::BrowserClosed(_) => EventKind::BrowserClosed,
            ServerEvent::AgentLog(_) => EventKind::AgentLog,
            ServerEvent::BrowserThought(_) => EventKind::BrowserThought,
            ServerEvent::BrowserSummary(_) => EventKind::BrowserSummary,
            ServerEvent::BrowserStep(_) => EventKind::BrowserStep,
            ServerEvent::AssistantThinking(_) => EventKind::AssistantThinking,
            ServerEvent::AssistantMessageChunk(_) => EventKind::AssistantMessageChunk,
            ServerEvent::AssistantMessageComplete(_) => EventKind::AssistantMessageComplete,
            ServerEvent::AssistantError(_) => EventKind::AssistantError,
            ServerEvent::ResearchPlanCreated(_) => EventKind::ResearchPlanCreated,
            ServerEvent::ResearchTaskStarted(_) => EventKind::ResearchTaskStarted,
            ServerEvent::ResearchTaskProgress(_) => EventKind::ResearchTaskProgress,
            ServerEvent::ResearchTaskCompleted(_) => EventKind::ResearchTaskCompleted,
            ServerEvent::ResearchReportReady(_) => EventKind::ResearchReportReady,
            ServerEvent::StepRecord(_) => EventKind::StepRecord,
            ServerEvent::CustomTaskComplete(_) => EventKind::CustomTaskComplete,
            ServerEvent::DataExportReady(_) => EventKind::DataExportReady,
            ServerEvent::DataExtracted(_) => EventKind::DataExtracted,
            ServerEvent::FileCreated(_) => EventKind::FileCreated,
            ServerEvent::Unknown { .. } => return None,
        };
        Some(kind)
    }

    /// Wire tag, including the tag of unknown events.
    pub fn tag(&self) -> &str {
        match self {
            ServerEvent::Unknown { kind } => kind,
            known => known.kind().map_or("unknown", EventKind::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Parse one raw text frame into a [`ServerEvent`].
pub fn parse_frame(raw: &str) -> Result<ServerEvent, ParseError> {
    let frame: RawFrame =
        serde_json::from_str(raw).map_err(|err| ParseError::Malformed(err.to_string()))?;
    let tag = frame.kind.ok_or(ParseError::MissingType)?;
    let Some(kind) = EventKind::from_tag(&tag) else {
        return Ok(ServerEvent::Unknown { kind: tag });
    };
    // Payload-less frames decode as an empty object so all-optional payloads still parse.
    let data = match frame.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    decode_payload(kind, data).map_err(|err| ParseError::Payload {
        kind: kind.as_str(),
        message: err.to_string(),
    })
}

fn decode_payload(kind: EventKind, data: Value) -> Result<ServerEvent, serde_json::Error> {
    use serde_json::from_value;

    let event = match kind {
        EventKind::TaskStarted => ServerEvent::TaskStarted(from_value(data)?),
        EventKind::Action => ServerEvent::Action(from_value(data)?),
        EventKind::BrowserAction => ServerEvent::BrowserAction(from_value(data)?),
        EventKind::TaskComplete => ServerEvent::TaskComplete(from_value(data)?),
        EventKind::TaskCancelled => ServerEvent::TaskCancelled(from_value(data)?),
        EventKind::TaskError => ServerEvent::TaskError(from_value(data)?),
        EventKind::StatusUpdate => ServerEvent::StatusUpdate(from_value(data)?),
        EventKind::TaskProgress => ServerEvent::TaskProgress(from_value(data)?),
        EventKind::BrowserClosed => ServerEvent::BrowserClosed(from_value(data)?),
        EventKind::AgentLog => ServerEvent::AgentLog(from_value(data)?),
        EventKind::BrowserThought => ServerEvent::BrowserThought(from_value(data)?),
        EventKind::BrowserSummary => ServerEvent::BrowserSummary(from_value(data)?),
        EventKind::BrowserStep => ServerEvent::BrowserStep(from_value(data)?),
        EventKind::AssistantThinking => ServerEvent::AssistantThinking(from_value(data)?),
        EventKind::AssistantMessageChunk => ServerEvent::AssistantMessageChunk(from_value(data)?),
        EventKind::AssistantMessageComplete => {
            ServerEvent::AssistantMessageComplete(from_value(data)?)
        }
        EventKind::AssistantError => ServerEvent::AssistantError(from_value(data)?),
        EventKind::ResearchPlanCreated => ServerEvent::ResearchPlanCreated(from_value(data)?),
        EventKind::ResearchTaskStarted => ServerEvent::ResearchTaskStarted(from_value(data)?),
        EventKind::ResearchTaskProgress => ServerEvent::ResearchTaskProgress(from_value(data)?),
        EventKind::ResearchTaskCompleted => ServerEvent::ResearchTaskCompleted(from_value(data)?),
        EventKind::ResearchReportReady => ServerEvent::ResearchReportReady(from_value(data)?),
        EventKind::StepRecord => ServerEvent::StepRecord(from_value(data)?),
        EventKind::CustomTaskComplete => ServerEvent::CustomTaskComplete(from_value(data)?),
        EventKind::DataExportReady => ServerEvent::DataExportReady(from_value(data)?),
        EventKind::DataExtracted => ServerEvent::DataExtracted(from_value(data)?),
        EventKind::FileCreated => ServerEvent::FileCreated(from_value(data)?),
    };
    Ok(event)
}
