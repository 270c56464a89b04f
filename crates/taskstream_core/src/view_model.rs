use crate::browser::BrowserStatus;
use crate::connection::ConnectionState;
use crate::conversation::{ConversationId, Message};
use crate::export::DataExport;
use crate::log_buffer::{FollowMode, LogEntry};
use crate::state::AppState;
use crate::task_tree::{Category, ProgressSummary};

/// Immutable snapshot handed to renderers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub connection: ConnectionState,
    pub active_conversation: Option<ConversationId>,
    pub conversations: Vec<ConversationRowView>,
    pub messages: Vec<Message>,
    /// Streamed assistant text for the active conversation.
    pub draft: Option<String>,
    /// The active conversation is waiting for an assistant reply.
    pub thinking: bool,
    pub browser: BrowserStatus,
    pub research: ResearchView,
    pub logs: LogView,
    pub export: DataExport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRowView {
    pub id: ConversationId,
    pub title: String,
    pub message_count: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResearchView {
    pub percent: u8,
    pub summary: ProgressSummary,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogView {
    pub entries: Vec<LogEntry>,
    pub mode: FollowMode,
    pub offset_from_tail: usize,
}

impl AppViewModel {
    pub(crate) fn from_state(state: &AppState) -> Self {
        let projections = state.projections();
        let conversations = &projections.conversations;
        let active = state
            .register()
            .active()
            .filter(|id| conversations.contains(id));

        let rows = conversations
            .list()
            .iter()
            .map(|conversation| ConversationRowView {
                id: conversation.id.clone(),
                title: conversation.title.clone(),
                message_count: conversation.messages.len(),
                active: Some(conversation.id.as_str()) == active,
            })
            .collect();
        let messages = active
            .and_then(|id| conversations.get(id))
            .map(|conversation| conversation.messages.clone())
            .unwrap_or_default();

        let tasks = &projections.tasks;
        let logs = &projections.logs;
        Self {
            connection: state.connection(),
            active_conversation: active.map(ToOwned::to_owned),
            conversations: rows,
            messages,
            draft: active
                .and_then(|id| conversations.draft(id))
                .map(ToOwned::to_owned),
            thinking: active.is_some() && conversations.thinking() == active,
            browser: projections.browser.clone(),
            research: ResearchView {
                percent: tasks.progress_percent(),
                summary: tasks.summary(),
                categories: tasks.categories().to_vec(),
            },
            logs: LogView {
                entries: logs.entries().cloned().collect(),
                mode: logs.mode(),
                offset_from_tail: logs.offset_from_tail(),
            },
            export: projections.export.clone(),
        }
    }
}
