use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{ResearchPlan, ServerEvent};
use crate::routing::{not_applicable, Target};
use crate::ProjectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchTask {
    pub description: String,
    pub status: TaskStatus,
    pub results: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub name: String,
    pub tasks: Vec<ResearchTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_progress: usize,
}

impl ProgressSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.pending + self.in_progress
    }
}

/// Hierarchical progress of one research session.
///
/// Tasks are addressed by `(category_index, task_index)` and never reordered.
/// Status updates are last-write-wins, so replaying a terminal update is a no-op.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskProgressTree {
    categories: Vec<Category>,
}

impl TaskProgressTree {
    pub fn from_plan(plan: &ResearchPlan) -> Self {
        let categories = plan
            .plan
            .iter()
            .map(|category| Category {
                name: category.name.clone(),
                tasks: category
                    .tasks
                    .iter()
                    .map(|task| ResearchTask {
                        description: task.description().to_string(),
                        status: TaskStatus::Pending,
                        results: None,
                        error: None,
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_initialized(&self) -> bool {
        !self.categories.is_empty()
    }

    pub fn task(&self, category: usize, task: usize) -> Option<&ResearchTask> {
        self.categories.get(category)?.tasks.get(task)
    }

    /// Counts by status, recomputed over the whole tree.
    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary::default();
        for task in self.categories.iter().flat_map(|category| &category.tasks) {
            match task.status {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
            }
        }
        summary
    }

    /// Whole percent of tasks completed; failed tasks do not count.
    pub fn progress_percent(&self) -> u8 {
        let summary = self.summary();
        let total = summary.total();
        if total == 0 {
            return 0;
        }
        (summary.completed * 100 / total) as u8
    }

    pub(crate) fn set_status(
        &mut self,
        category: usize,
        task: usize,
        status: TaskStatus,
        results: Option<&Value>,
        error: Option<&str>,
    ) -> Result<(), ProjectionError> {
        if !self.is_initialized() {
            return Err(ProjectionError::NoPlan);
        }
        let len = self.categories.len();
        let entry = self
            .categories
            .get_mut(category)
            .ok_or(ProjectionError::UnknownCategory { category, len })?;
        let len = entry.tasks.len();
        let entry = entry
            .tasks
            .get_mut(task)
            .ok_or(ProjectionError::UnknownTask {
                category,
                task,
                len,
            })?;
        entry.status = status;
        if let Some(results) = results {
            entry.results = Some(results.clone());
        }
        if let Some(error) = error {
            entry.error = Some(error.to_string());
        }
        Ok(())
    }
}

pub(crate) fn reduce(tree: &mut TaskProgressTree, event: &ServerEvent) -> Result<(), ProjectionError> {
    match event {
        ServerEvent::ResearchPlanCreated(plan) => {
            *tree = TaskProgressTree::from_plan(plan);
            Ok(())
        }
        ServerEvent::ResearchTaskStarted(update) => tree.set_status(
            update.category_index,
            update.task_index,
            TaskStatus::InProgress,
            None,
            None,
        ),
        ServerEvent::ResearchTaskProgress(update) => tree.set_status(
            update.category_index,
            update.task_index,
            TaskStatus::InProgress,
            update.results.as_ref(),
            None,
        ),
        ServerEvent::ResearchTaskCompleted(update) => tree.set_status(
            update.category_index,
            update.task_index,
            update.terminal_status(),
            update.results.as_ref(),
            update.error.as_deref(),
        ),
        other => Err(not_applicable(other, Target::TaskTree)),
    }
}
