use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::event::{ServerEvent, TaskNotice};
use crate::routing::{not_applicable, Target};
use crate::task_tree::TaskStatus;
use crate::ProjectionError;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// A consumer within this many entries of the tail is following it.
pub const FOLLOW_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lenient mapping of server level names; unknown names are `Info`.
    pub fn from_name(name: &str) -> LogLevel {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" | "critical" | "fatal" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FollowMode {
    /// Pinned to the newest entry.
    #[default]
    Follow,
    /// Anchored to an older entry; appends do not move the consumer.
    Paused,
}

/// Bounded, append-only log with a follow/paused consumption cursor.
///
/// Entry ids are contiguous inside the buffer: entries only leave from the
/// front (oldest-first eviction) and only arrive at the back.
#[derive(Debug, Clone, PartialEq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
    mode: FollowMode,
    anchor: Option<u64>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // Grows on demand; the cap is enforced in `push`.
            entries: VecDeque::new(),
            capacity,
            next_id: 1,
            mode: FollowMode::Follow,
            anchor: None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    /// Id of the entry the consumer is looking at.
    pub fn anchor(&self) -> Option<u64> {
        self.anchor
    }

    /// How many entries sit below the consumer's position.
    pub fn offset_from_tail(&self) -> usize {
        match (self.anchor, self.entries.back()) {
            (Some(anchor), Some(newest)) => newest.id.saturating_sub(anchor) as usize,
            _ => 0,
        }
    }

    pub fn push(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Option<Value>,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id,
            timestamp,
            level,
            message: message.into(),
            metadata,
        });
        match self.mode {
            FollowMode::Follow => self.anchor = Some(id),
            FollowMode::Paused => self.clamp_anchor(),
        }
        id
    }

    /// Consumer moved to `offset` entries above the tail.
    pub(crate) fn scroll_to(&mut self, offset_from_tail: usize) {
        if self.entries.is_empty() {
            self.mode = FollowMode::Follow;
            self.anchor = None;
            return;
        }
        let offset = offset_from_tail.min(self.entries.len() - 1);
        if offset <= FOLLOW_THRESHOLD {
            self.mode = FollowMode::Follow;
            self.anchor = self.entries.back().map(|entry| entry.id);
        } else {
            self.mode = FollowMode::Paused;
            let index = self.entries.len() - 1 - offset;
            self.anchor = self.entries.get(index).map(|entry| entry.id);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.mode = FollowMode::Follow;
        self.anchor = None;
    }

    fn clamp_anchor(&mut self) {
        if let (Some(anchor), Some(oldest)) = (self.anchor, self.entries.front()) {
            if anchor < oldest.id {
                self.anchor = Some(oldest.id);
            }
        }
    }
}

pub(crate) fn reduce(
    logs: &mut LogBuffer,
    event: &ServerEvent,
    at: DateTime<Utc>,
) -> Result<(), ProjectionError> {
    let (level, message, metadata) = match event {
        ServerEvent::TaskStarted(notice) => (
            LogLevel::Info,
            labelled("Task started", notice.task.as_deref().or(notice.message.as_deref())),
            task_metadata(notice),
        ),
        ServerEvent::Action(action) | ServerEvent::BrowserAction(action) => (
            LogLevel::Info,
            format!("Action: {}", action.describe()),
            action.details.clone(),
        ),
        ServerEvent::TaskComplete(notice) | ServerEvent::CustomTaskComplete(notice) => (
            LogLevel::Info,
            labelled("Task complete", notice.outcome_text().as_deref()),
            task_metadata(notice),
        ),
        ServerEvent::TaskCancelled(notice) => (
            LogLevel::Warn,
            labelled("Task cancelled", notice.message.as_deref()),
            task_metadata(notice),
        ),
        ServerEvent::TaskError(notice) => (
            LogLevel::Error,
            labelled(
                "Task error",
                notice.error.as_deref().or(notice.message.as_deref()),
            ),
            task_metadata(notice),
        ),
        ServerEvent::TaskProgress(progress) => (
            LogLevel::Info,
            format!("Progress {}", progress.describe()),
            None,
        ),
        ServerEvent::BrowserClosed(notice) => (
            LogLevel::Info,
            labelled("Browser closed", notice.message.as_deref()),
            None,
        ),
        ServerEvent::AgentLog(log) => (
            log.level.as_deref().map_or(LogLevel::Info, LogLevel::from_name),
            log.message.clone(),
            log.metadata.clone(),
        ),
        ServerEvent::BrowserThought(thought) => (
            LogLevel::Debug,
            format!("Thought: {}", thought.thought),
            None,
        ),
        ServerEvent::BrowserSummary(summary) => (
            LogLevel::Info,
            format!("Summary: {}", summary.summary),
            None,
        ),
        ServerEvent::BrowserStep(step) => (
            LogLevel::Info,
            step.describe(),
            step.url.as_ref().map(|url| json!({ "url": url })),
        ),
        ServerEvent::AssistantError(error) => (
            LogLevel::Error,
            labelled("Assistant error", Some(&error.error)),
            None,
        ),
        ServerEvent::ResearchPlanCreated(plan) => (
            LogLevel::Info,
            format!(
                "Research plan created with {} tasks in {} categories",
                plan.task_count(),
                plan.plan.len()
            ),
            None,
        ),
        ServerEvent::ResearchTaskStarted(update) => (
            LogLevel::Info,
            format!(
                "Research task {}.{} started",
                update.category_index, update.task_index
            ),
            None,
        ),
        ServerEvent::ResearchTaskProgress(update) => (
            LogLevel::Info,
            labelled(
                &format!(
                    "Research task {}.{} progress",
                    update.category_index, update.task_index
                ),
                update.message.as_deref(),
            ),
            None,
        ),
        ServerEvent::ResearchTaskCompleted(update) => {
            let status = update.terminal_status();
            let level = if status == TaskStatus::Completed {
                LogLevel::Info
            } else {
                LogLevel::Warn
            };
            (
                level,
                labelled(
                    &format!(
                        "Research task {}.{} {:?}",
                        update.category_index, update.task_index, status
                    ),
                    update.error.as_deref(),
                ),
                None,
            )
        }
        ServerEvent::ResearchReportReady(report) => (
            LogLevel::Info,
            labelled("Research report ready", report.path.as_deref()),
            None,
        ),
        ServerEvent::StepRecord(record) => (
            LogLevel::Debug,
            format!(
                "Step record {}",
                record.step.map_or_else(|| "-".to_string(), |step| step.to_string())
            ),
            Some(json!({
                "action": record.action,
                "url": record.url,
                "details": record.details,
            })),
        ),
        ServerEvent::DataExportReady(export) => (
            LogLevel::Info,
            format!(
                "Data export ready: {} ({} items)",
                export.filename.as_deref().unwrap_or("unnamed"),
                export.item_count.unwrap_or(0)
            ),
            export.path.as_ref().map(|path| json!({ "path": path })),
        ),
        ServerEvent::DataExtracted(extracted) => (
            LogLevel::Info,
            format!("Extracted {} items", extracted.item_count.unwrap_or(0)),
            None,
        ),
        ServerEvent::FileCreated(file) => (
            LogLevel::Info,
            format!("File created: {}", file.filename),
            file.path.as_ref().map(|path| json!({ "path": path })),
        ),
        other => return Err(not_applicable(other, Target::Log)),
    };
    logs.push(level, message, metadata, at);
    Ok(())
}

fn labelled(label: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) if !detail.trim().is_empty() => format!("{label}: {detail}"),
        _ => label.to_string(),
    }
}

fn task_metadata(notice: &TaskNotice) -> Option<Value> {
    notice
        .task_id
        .as_ref()
        .map(|task_id| json!({ "task_id": task_id }))
}
