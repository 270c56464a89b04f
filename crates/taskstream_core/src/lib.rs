//! Taskstream core: event model, projections and the pure dispatcher.
//!
//! Nothing in this crate performs IO or reads a clock. Every input arrives as a
//! [`Msg`] carrying its own timestamp, and every side effect leaves as an
//! [`Effect`].
mod browser;
mod command;
mod connection;
mod conversation;
mod correlation;
mod effect;
mod error;
mod event;
mod export;
mod log_buffer;
mod msg;
mod routing;
mod state;
mod task_tree;
mod update;
mod view_model;

pub use browser::BrowserStatus;
pub use command::{ControlAction, OutboundCommand, ResearchAction};
pub use connection::ConnectionState;
pub use conversation::{
    title_from, Conversation, ConversationId, Conversations, Message, Sender, DEFAULT_TITLE,
};
pub use correlation::CorrelationRegister;
pub use effect::Effect;
pub use error::{ParseError, ProjectionError};
pub use event::{
    parse_frame, AgentLogEvent, AssistantErrorEvent, AssistantText, BrowserActionEvent,
    BrowserStepEvent, BrowserSummaryEvent, BrowserThoughtEvent, DataExportNotice,
    DataExtractedEvent, EventKind, FileCreatedEvent, Notice, PlanCategory, PlanTaskSpec,
    ResearchPlan, ResearchReport, ResearchTaskUpdate, ServerEvent, StepRecordEvent, TaskNotice,
    TaskProgressEvent,
};
pub use export::DataExport;
pub use log_buffer::{
    FollowMode, LogBuffer, LogEntry, LogLevel, DEFAULT_LOG_CAPACITY, FOLLOW_THRESHOLD,
};
pub use msg::Msg;
pub use routing::{targets, Target};
pub use state::{AppState, Projections};
pub use task_tree::{Category, ProgressSummary, ResearchTask, TaskProgressTree, TaskStatus};
pub use update::update;
pub use view_model::{AppViewModel, ConversationRowView, LogView, ResearchView};
