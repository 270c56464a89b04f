use thiserror::Error;

use crate::routing::Target;

/// A raw inbound frame that could not be turned into an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame is not valid json: {0}")]
    Malformed(String),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("payload for `{kind}` does not match its schema: {message}")]
    Payload { kind: &'static str, message: String },
}

/// An event that referenced state the projection does not have.
///
/// Always handled as a no-op by the dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("no conversation is active")]
    NoActiveConversation,
    #[error("conversation {0} does not exist")]
    UnknownConversation(String),
    #[error("no research plan has been created yet")]
    NoPlan,
    #[error("category index {category} is out of range ({len} categories)")]
    UnknownCategory { category: usize, len: usize },
    #[error("task index {task} is out of range for category {category} ({len} tasks)")]
    UnknownTask {
        category: usize,
        task: usize,
        len: usize,
    },
    #[error("`{kind}` events are not applicable to the {target:?} projection")]
    NotApplicable { kind: &'static str, target: Target },
}

impl ProjectionError {
    /// Routing mistakes are bugs; everything else is an expected no-op.
    pub fn is_routing_bug(&self) -> bool {
        matches!(self, ProjectionError::NotApplicable { .. })
    }
}
