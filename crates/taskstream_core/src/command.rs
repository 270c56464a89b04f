//! Outbound command envelopes.
use std::fmt;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Close,
    Stop,
    Pause,
    Resume,
    StopResearch,
    ResumeResearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchAction {
    Start,
}

/// A command sent to the server as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// First frame on every freshly opened connection.
    Handshake { client_id: String },
    Task {
        task: String,
        llm_model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    Control {
        action: ControlAction,
        #[serde(rename = "taskId", skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    DeepResearch {
        action: ResearchAction,
        topic: String,
        task_id: String,
        llm_model: String,
        max_parallel_browsers: u32,
    },
}

impl OutboundCommand {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short human label used in failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            OutboundCommand::Handshake { .. } => "handshake",
            OutboundCommand::Task { .. } => "task",
            OutboundCommand::Control { .. } => "control command",
            OutboundCommand::DeepResearch { .. } => "research request",
        }
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundCommand::Control { action, .. } => write!(f, "control {action:?}"),
            other => f.write_str(other.label()),
        }
    }
}
