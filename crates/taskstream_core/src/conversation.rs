use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::correlation::CorrelationRegister;
use crate::event::ServerEvent;
use crate::routing::{not_applicable, Target};
use crate::ProjectionError;

pub type ConversationId = String;

pub const DEFAULT_TITLE: &str = "New conversation";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn append(
        &mut self,
        sender: Sender,
        content: String,
        metadata: Option<Value>,
        at: DateTime<Utc>,
    ) {
        // Positional ids are stable because messages are never removed or reordered.
        let id = format!("{}:{}", self.id, self.messages.len() + 1);
        self.messages.push(Message {
            id,
            content,
            sender,
            timestamp: at,
            metadata,
        });
        self.updated_at = at;
    }
}

/// All conversations plus in-flight assistant output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conversations {
    list: Vec<Conversation>,
    drafts: BTreeMap<ConversationId, String>,
    thinking: Option<ConversationId>,
    created: u64,
}

impl Conversations {
    pub fn list(&self) -> &[Conversation] {
        &self.list
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.list.iter().find(|conversation| conversation.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Streamed assistant text not yet completed for `id`.
    pub fn draft(&self, id: &str) -> Option<&str> {
        self.drafts.get(id).map(String::as_str)
    }

    /// Conversation whose assistant reply is in progress.
    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref()
    }

    /// Most recently updated conversation.
    pub fn latest(&self) -> Option<&Conversation> {
        self.list
            .iter()
            .max_by_key(|conversation| conversation.updated_at)
    }

    pub(crate) fn restore(&mut self, list: Vec<Conversation>) {
        self.list = list;
        self.drafts.clear();
        self.thinking = None;
    }

    pub(crate) fn create(&mut self, title: Option<&str>, at: DateTime<Utc>) -> ConversationId {
        let id = loop {
            self.created += 1;
            let candidate = format!("conv-{}-{}", at.timestamp_millis(), self.created);
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        let title = title
            .map(title_from)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        self.list.push(Conversation::new(id.clone(), title, at));
        id
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let before = self.list.len();
        self.list.retain(|conversation| conversation.id != id);
        self.drafts.remove(id);
        if self.thinking.as_deref() == Some(id) {
            self.thinking = None;
        }
        self.list.len() != before
    }

    pub(crate) fn append(
        &mut self,
        id: &str,
        sender: Sender,
        content: impl Into<String>,
        metadata: Option<Value>,
        at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        let conversation = self
            .list
            .iter_mut()
            .find(|conversation| conversation.id == id)
            .ok_or_else(|| ProjectionError::UnknownConversation(id.to_string()))?;
        conversation.append(sender, content.into(), metadata, at);
        Ok(())
    }
}

/// Shortened first line of `text`, used to title conversations.
pub fn title_from(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
    title.push('…');
    title
}

enum ChatUpdate {
    Append {
        sender: Sender,
        content: String,
        metadata: Value,
    },
    Thinking,
    Chunk(Option<String>),
    Complete(Option<String>),
    Failed(String),
}

fn chat_update(event: &ServerEvent) -> Result<ChatUpdate, ProjectionError> {
    let tag = event.tag();
    let append = |sender: Sender, content: String, extra: Value| {
        let mut metadata = json!({ "event": tag });
        if let (Some(target), Value::Object(extra)) = (metadata.as_object_mut(), extra) {
            target.extend(extra);
        }
        ChatUpdate::Append {
            sender,
            content,
            metadata,
        }
    };
    let update = match event {
        ServerEvent::TaskStarted(notice) => append(
            Sender::System,
            match notice.task.as_deref().or(notice.message.as_deref()) {
                Some(task) => format!("Task started: {task}"),
                None => "Task started".to_string(),
            },
            json!({ "task_id": notice.task_id }),
        ),
        ServerEvent::Action(action) | ServerEvent::BrowserAction(action) => append(
            Sender::Assistant,
            action.describe(),
            json!({ "kind": "action", "url": action.url }),
        ),
        ServerEvent::TaskComplete(notice) | ServerEvent::CustomTaskComplete(notice) => append(
            Sender::Assistant,
            notice
                .outcome_text()
                .unwrap_or_else(|| "Task complete".to_string()),
            json!({ "kind": "result", "task_id": notice.task_id }),
        ),
        ServerEvent::TaskCancelled(notice) => append(
            Sender::System,
            notice
                .message
                .clone()
                .unwrap_or_else(|| "Task cancelled".to_string()),
            json!({ "task_id": notice.task_id }),
        ),
        ServerEvent::TaskError(notice) => append(
            Sender::System,
            format!(
                "Task failed: {}",
                notice
                    .error
                    .as_deref()
                    .or(notice.message.as_deref())
                    .unwrap_or("unknown error")
            ),
            json!({ "kind": "error", "task_id": notice.task_id }),
        ),
        ServerEvent::BrowserThought(thought) => append(
            Sender::Assistant,
            thought.thought.clone(),
            json!({ "kind": "thought", "step": thought.step }),
        ),
        ServerEvent::BrowserSummary(summary) => append(
            Sender::Assistant,
            summary.summary.clone(),
            json!({ "kind": "summary" }),
        ),
        ServerEvent::BrowserStep(step) => append(
            Sender::Assistant,
            step.describe(),
            json!({ "kind": "step", "step": step.step, "url": step.url }),
        ),
        ServerEvent::AssistantThinking(_) => ChatUpdate::Thinking,
        ServerEvent::AssistantMessageChunk(chunk) => ChatUpdate::Chunk(chunk.content.clone()),
        ServerEvent::AssistantMessageComplete(done) => ChatUpdate::Complete(done.content.clone()),
        ServerEvent::AssistantError(error) => ChatUpdate::Failed(error.error.clone()),
        ServerEvent::ResearchPlanCreated(plan) => append(
            Sender::System,
            format!(
                "Research plan created: {} tasks in {} categories",
                plan.task_count(),
                plan.plan.len()
            ),
            json!({ "kind": "plan" }),
        ),
        ServerEvent::ResearchReportReady(report) => append(
            Sender::Assistant,
            report.report.clone(),
            json!({ "kind": "report", "path": report.path }),
        ),
        ServerEvent::DataExtracted(extracted) => append(
            Sender::System,
            extracted.message.clone().unwrap_or_else(|| {
                format!("Extracted {} items", extracted.item_count.unwrap_or(0))
            }),
            json!({ "item_count": extracted.item_count }),
        ),
        ServerEvent::FileCreated(file) => append(
            Sender::System,
            format!("File created: {}", file.filename),
            json!({ "path": file.path }),
        ),
        other => return Err(not_applicable(other, Target::Conversations)),
    };
    Ok(update)
}

/// Applies a conversation-scoped event to whichever conversation is active now.
pub(crate) fn reduce(
    conversations: &mut Conversations,
    register: &CorrelationRegister,
    event: &ServerEvent,
    at: DateTime<Utc>,
) -> Result<(), ProjectionError> {
    let update = chat_update(event)?;
    let active = register
        .active()
        .ok_or(ProjectionError::NoActiveConversation)?
        .to_string();
    if !conversations.contains(&active) {
        return Err(ProjectionError::UnknownConversation(active));
    }

    match update {
        ChatUpdate::Append {
            sender,
            content,
            metadata,
        } => conversations.append(&active, sender, content, Some(metadata), at),
        ChatUpdate::Thinking => {
            conversations.thinking = Some(active);
            Ok(())
        }
        ChatUpdate::Chunk(chunk) => {
            if let Some(chunk) = chunk {
                conversations.drafts.entry(active).or_default().push_str(&chunk);
            }
            Ok(())
        }
        ChatUpdate::Complete(content) => {
            let draft = conversations.drafts.remove(&active);
            conversations.thinking = None;
            let text = content
                .filter(|text| !text.is_empty())
                .or(draft)
                .unwrap_or_default();
            if text.is_empty() {
                return Ok(());
            }
            conversations.append(
                &active,
                Sender::Assistant,
                text,
                Some(json!({ "event": "assistant_message_complete" })),
                at,
            )
        }
        ChatUpdate::Failed(error) => {
            conversations.drafts.remove(&active);
            conversations.thinking = None;
            conversations.append(
                &active,
                Sender::System,
                format!("Assistant error: {error}"),
                Some(json!({ "event": "assistant_error", "kind": "error" })),
                at,
            )
        }
    }
}
