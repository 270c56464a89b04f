use chrono::{DateTime, Utc};
use serde_json::json;
use stream_logging::{stream_debug, stream_info, stream_warn};

use crate::command::{OutboundCommand, ResearchAction};
use crate::conversation::{ConversationId, Sender};
use crate::event::parse_frame;
use crate::routing::apply_event;
use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let mut effects = match msg {
        Msg::FrameReceived { raw, received_at } => {
            match parse_frame(&raw) {
                Ok(event) => apply_event(&mut state, &event, received_at),
                Err(err) => stream_warn!("Discarding inbound frame: {}", err),
            }
            Vec::new()
        }
        Msg::ConnectionChanged(connection) => {
            if state.set_connection(connection) {
                stream_info!("Connection is now {}", connection);
            }
            Vec::new()
        }
        Msg::RestoreConversations(list) => {
            let count = list.len();
            state.projections_mut().conversations.restore(list);
            let latest = state
                .projections()
                .conversations
                .latest()
                .map(|conversation| conversation.id.clone());
            match latest {
                Some(id) => state.register_mut().select(id),
                None => {
                    state.register_mut().clear();
                }
            }
            stream_info!("Restored {} conversations", count);
            state.mark_dirty();
            Vec::new()
        }
        Msg::NewConversation { title, at } => {
            let id = state
                .projections_mut()
                .conversations
                .create(title.as_deref(), at);
            stream_debug!("Created conversation {}", id);
            state.register_mut().select(id);
            state.mark_dirty();
            state.request_persist();
            Vec::new()
        }
        Msg::SelectConversation(id) => {
            if state.projections().conversations.contains(&id) {
                state.register_mut().select(id);
                state.mark_dirty();
            } else {
                stream_warn!("Cannot select unknown conversation {}", id);
            }
            Vec::new()
        }
        Msg::DeleteConversation(id) => {
            if state.projections_mut().conversations.remove(&id) {
                state.register_mut().release(&id);
                state.mark_dirty();
                state.request_persist();
            } else {
                stream_warn!("Cannot delete unknown conversation {}", id);
            }
            Vec::new()
        }
        Msg::SubmitTask {
            task,
            llm_model,
            metadata,
            at,
        } => {
            let task = task.trim().to_string();
            if task.is_empty() {
                return (state, Vec::new());
            }
            let conversation = ensure_active(&mut state, &task, at);
            append_user(
                &mut state,
                &conversation,
                task.clone(),
                json!({ "kind": "task", "llm_model": llm_model }),
                at,
            );
            vec![Effect::Transmit(OutboundCommand::Task {
                task,
                llm_model,
                metadata,
            })]
        }
        Msg::StartResearch {
            topic,
            task_id,
            llm_model,
            max_parallel_browsers,
            at,
        } => {
            let topic = topic.trim().to_string();
            if topic.is_empty() {
                return (state, Vec::new());
            }
            let conversation = ensure_active(&mut state, &topic, at);
            append_user(
                &mut state,
                &conversation,
                format!("Research: {topic}"),
                json!({ "kind": "research", "task_id": task_id }),
                at,
            );
            vec![Effect::Transmit(OutboundCommand::DeepResearch {
                action: ResearchAction::Start,
                topic,
                task_id,
                llm_model,
                max_parallel_browsers,
            })]
        }
        Msg::Control { action, task_id } => {
            vec![Effect::Transmit(OutboundCommand::Control { action, task_id })]
        }
        Msg::SendFailed {
            command,
            reason,
            at,
        } => {
            let active = state.register().active().map(ToOwned::to_owned);
            match active {
                Some(id) => {
                    let appended = state.projections_mut().conversations.append(
                        &id,
                        Sender::System,
                        format!("Failed to send {}: {}", command.label(), reason),
                        Some(json!({ "event": "send_failed", "kind": "error" })),
                        at,
                    );
                    match appended {
                        Ok(()) => {
                            state.mark_dirty();
                            state.request_persist();
                        }
                        Err(err) => stream_warn!("Dropping send failure for {}: {}", command, err),
                    }
                }
                None => stream_warn!(
                    "Dropping send failure for {} (no active conversation): {}",
                    command,
                    reason
                ),
            }
            Vec::new()
        }
        Msg::LogScrolled { offset_from_tail } => {
            state.projections_mut().logs.scroll_to(offset_from_tail);
            state.mark_dirty();
            Vec::new()
        }
        Msg::ClearLogs => {
            state.projections_mut().logs.clear();
            state.mark_dirty();
            Vec::new()
        }
    };

    if state.take_persist() {
        effects.push(Effect::PersistConversations(
            state.projections().conversations.list().to_vec(),
        ));
    }
    (state, effects)
}

/// Active conversation id, creating and selecting one titled after `text` if
/// none is active.
fn ensure_active(state: &mut AppState, text: &str, at: DateTime<Utc>) -> ConversationId {
    if let Some(id) = state.register().active() {
        if state.projections().conversations.contains(id) {
            return id.to_string();
        }
    }
    let id = state.projections_mut().conversations.create(Some(text), at);
    stream_debug!("Created conversation {} for outbound request", id);
    state.register_mut().select(id.clone());
    id
}

fn append_user(
    state: &mut AppState,
    conversation: &str,
    content: String,
    metadata: serde_json::Value,
    at: DateTime<Utc>,
) {
    let appended = state.projections_mut().conversations.append(
        conversation,
        Sender::User,
        content,
        Some(metadata),
        at,
    );
    match appended {
        Ok(()) => {
            state.mark_dirty();
            state.request_persist();
        }
        Err(err) => stream_warn!("Could not record user message: {}", err),
    }
}
