use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::command::{ControlAction, OutboundCommand};
use crate::connection::ConnectionState;
use crate::conversation::{Conversation, ConversationId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Raw text frame from the server, stamped when it was received.
    FrameReceived {
        raw: String,
        received_at: DateTime<Utc>,
    },
    /// Connection actor moved to a new state.
    ConnectionChanged(ConnectionState),
    /// Conversations loaded from storage at startup.
    RestoreConversations(Vec<Conversation>),
    /// User created a conversation; it becomes active.
    NewConversation {
        title: Option<String>,
        at: DateTime<Utc>,
    },
    SelectConversation(ConversationId),
    DeleteConversation(ConversationId),
    /// User submitted a browser task.
    SubmitTask {
        task: String,
        llm_model: String,
        metadata: Option<Value>,
        at: DateTime<Utc>,
    },
    /// User started a deep-research run.
    StartResearch {
        topic: String,
        task_id: String,
        llm_model: String,
        max_parallel_browsers: u32,
        at: DateTime<Utc>,
    },
    Control {
        action: ControlAction,
        task_id: Option<String>,
    },
    /// Outbound sender gave up on a command.
    SendFailed {
        command: OutboundCommand,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Log consumer reported its scroll position.
    LogScrolled { offset_from_tail: usize },
    ClearLogs,
}
