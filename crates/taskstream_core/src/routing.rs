//! Routing table and the per-event apply step.
use chrono::{DateTime, Utc};
use stream_logging::{stream_debug, stream_error, stream_trace};

use crate::event::{EventKind, ServerEvent};
use crate::state::AppState;
use crate::{browser, conversation, export, log_buffer, task_tree, ProjectionError};

/// A projection an event can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Target {
    Conversations,
    Browser,
    TaskTree,
    Log,
    Export,
}

use Target::{Browser, Conversations, Export, Log, TaskTree};

/// Projections updated by `kind`, in the order they are applied.
pub fn targets(kind: EventKind) -> &'static [Target] {
    match kind {
        EventKind::TaskStarted => &[Conversations, Browser, Log],
        EventKind::Action | EventKind::BrowserAction => &[Conversations, Browser, Log],
        EventKind::TaskComplete => &[Conversations, Browser, Log],
        EventKind::TaskCancelled => &[Conversations, Browser, Log],
        EventKind::TaskError => &[Conversations, Browser, Log],
        EventKind::StatusUpdate => &[Browser],
        EventKind::TaskProgress => &[Log],
        EventKind::BrowserClosed => &[Browser, Log],
        EventKind::AgentLog => &[Log],
        EventKind::BrowserThought => &[Conversations, Log],
        EventKind::BrowserSummary => &[Conversations, Log],
        EventKind::BrowserStep => &[Conversations, Browser, Log],
        EventKind::AssistantThinking
        | EventKind::AssistantMessageChunk
        | EventKind::AssistantMessageComplete => &[Conversations],
        EventKind::AssistantError => &[Conversations, Log],
        EventKind::ResearchPlanCreated => &[Conversations, TaskTree, Log],
        EventKind::ResearchTaskStarted
        | EventKind::ResearchTaskProgress
        | EventKind::ResearchTaskCompleted => &[TaskTree, Log],
        EventKind::ResearchReportReady => &[Conversations, Log],
        EventKind::StepRecord => &[Log],
        EventKind::CustomTaskComplete => &[Conversations, Browser, Log],
        EventKind::DataExportReady => &[Log, Export],
        EventKind::DataExtracted => &[Conversations, Log],
        EventKind::FileCreated => &[Conversations, Log],
    }
}

pub(crate) fn not_applicable(event: &ServerEvent, target: Target) -> ProjectionError {
    ProjectionError::NotApplicable {
        kind: event.kind().map_or("unknown", EventKind::as_str),
        target,
    }
}

/// Applies one decoded event to every projection it routes to.
///
/// A failing target is logged and skipped; the remaining targets and all later
/// events are still applied.
pub(crate) fn apply_event(
    state: &mut AppState,
    event: &ServerEvent,
    received_at: DateTime<Utc>,
) {
    let Some(kind) = event.kind() else {
        stream_debug!("Ignoring event of unknown kind `{}`", event.tag());
        return;
    };

    for &target in targets(kind) {
        let outcome = {
            let (projections, register) = state.split_mut();
            match target {
                Conversations => conversation::reduce(
                    &mut projections.conversations,
                    register,
                    event,
                    received_at,
                ),
                Browser => browser::reduce(&mut projections.browser, event),
                TaskTree => task_tree::reduce(&mut projections.tasks, event),
                Log => log_buffer::reduce(&mut projections.logs, event, received_at),
                Export => export::reduce(&mut projections.export, event),
            }
        };
        match outcome {
            Ok(()) => {
                stream_trace!("Applied `{}` to {:?}", kind, target);
                state.mark_dirty();
                if target == Conversations && touches_history(kind) {
                    state.request_persist();
                }
            }
            Err(err) if err.is_routing_bug() => {
                stream_error!("Routing table sent `{}` to {:?}: {}", kind, target, err);
            }
            Err(err) => {
                stream_debug!("`{}` left {:?} unchanged: {}", kind, target, err);
            }
        }
    }
}

/// Streaming-only events change drafts, which are never persisted.
fn touches_history(kind: EventKind) -> bool {
    !matches!(
        kind,
        EventKind::AssistantThinking | EventKind::AssistantMessageChunk
    )
}
