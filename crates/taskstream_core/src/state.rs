use crate::browser::BrowserStatus;
use crate::connection::ConnectionState;
use crate::conversation::Conversations;
use crate::correlation::CorrelationRegister;
use crate::export::DataExport;
use crate::log_buffer::LogBuffer;
use crate::task_tree::TaskProgressTree;
use crate::view_model::AppViewModel;

/// The five read models built from the event stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projections {
    pub conversations: Conversations,
    pub browser: BrowserStatus,
    pub tasks: TaskProgressTree,
    pub logs: LogBuffer,
    pub export: DataExport,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    projections: Projections,
    register: CorrelationRegister,
    connection: ConnectionState,
    dirty: bool,
    persist_pending: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            projections: Projections {
                logs: LogBuffer::with_capacity(capacity),
                ..Projections::default()
            },
            ..Self::default()
        }
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    pub fn register(&self) -> &CorrelationRegister {
        &self.register
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_state(self)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn request_persist(&mut self) {
        self.persist_pending = true;
    }

    pub(crate) fn take_persist(&mut self) -> bool {
        std::mem::take(&mut self.persist_pending)
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) -> bool {
        if self.connection == connection {
            return false;
        }
        self.connection = connection;
        self.dirty = true;
        true
    }

    pub(crate) fn projections_mut(&mut self) -> &mut Projections {
        &mut self.projections
    }

    pub(crate) fn register_mut(&mut self) -> &mut CorrelationRegister {
        &mut self.register
    }

    /// Projections and register borrowed together, for reducers that read the
    /// active conversation while writing.
    pub(crate) fn split_mut(&mut self) -> (&mut Projections, &CorrelationRegister) {
        (&mut self.projections, &self.register)
    }
}
