use std::sync::Arc;

use serde_json::Value;
use stream_logging::{stream_debug, stream_error, stream_info, stream_warn};
use taskstream_core::{
    update, AppState, AppViewModel, ConnectionState, ControlAction, ConversationId, Effect, Msg,
    OutboundCommand,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, EngineConfig};
use crate::connection::{ConnectionActor, ConnectionHandle};
use crate::persist::ConversationStore;
use crate::sender::OutboundSender;
use crate::transport::Transport;
use crate::{LinkNotice, SendFailure};

/// Requests from collaborators; stamped with the engine clock on arrival.
enum EngineCommand {
    NewConversation { title: Option<String> },
    SelectConversation(ConversationId),
    DeleteConversation(ConversationId),
    SubmitTask { task: String, metadata: Option<Value> },
    StartResearch { topic: String },
    Control { action: ControlAction, task_id: Option<String> },
    ScrollLogs { offset_from_tail: usize },
    ClearLogs,
}

/// Handle to a running engine: issue commands, read snapshots, shut down.
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    snapshots: watch::Receiver<AppViewModel>,
    connection: ConnectionHandle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Starts the connection actor, the outbound worker and the engine loop on
    /// the current runtime, restores saved conversations and connects.
    pub fn start(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cancel = CancellationToken::new();

        let (notice_tx, notices) = mpsc::unbounded_channel();
        let (connection, actor_task) = ConnectionActor::spawn(
            config.connection.clone(),
            transport,
            notice_tx,
            cancel.child_token(),
        );
        let (failure_tx, failures) = mpsc::unbounded_channel();
        let (sender, sender_task) = OutboundSender::spawn(
            connection.clone(),
            config.retry,
            failure_tx,
            cancel.child_token(),
        );

        let mut state = AppState::with_log_capacity(config.log_capacity);
        match store.load() {
            Ok(saved) => state = update(state, Msg::RestoreConversations(saved)).0,
            Err(err) => stream_warn!("Starting without saved conversations: {}", err),
        }
        state.consume_dirty();
        let (snapshot_tx, snapshots) = watch::channel(state.view());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let engine = EngineLoop {
            config,
            state: Some(state),
            store,
            sender,
            snapshots: snapshot_tx,
        };
        let loop_task = tokio::spawn(engine.run(
            notices,
            command_rx,
            failures,
            cancel.child_token(),
        ));

        connection.connect();
        stream_info!("Engine started");
        Ok(Self {
            commands,
            snapshots,
            connection,
            cancel,
            tasks: vec![actor_task, sender_task, loop_task],
        })
    }

    pub fn new_conversation(&self, title: Option<String>) {
        self.send(EngineCommand::NewConversation { title });
    }

    pub fn select_conversation(&self, id: impl Into<ConversationId>) {
        self.send(EngineCommand::SelectConversation(id.into()));
    }

    pub fn delete_conversation(&self, id: impl Into<ConversationId>) {
        self.send(EngineCommand::DeleteConversation(id.into()));
    }

    pub fn submit_task(&self, task: impl Into<String>, metadata: Option<Value>) {
        self.send(EngineCommand::SubmitTask {
            task: task.into(),
            metadata,
        });
    }

    pub fn start_research(&self, topic: impl Into<String>) {
        self.send(EngineCommand::StartResearch {
            topic: topic.into(),
        });
    }

    pub fn control(&self, action: ControlAction, task_id: Option<String>) {
        self.send(EngineCommand::Control { action, task_id });
    }

    /// Reports the log consumer's position as an offset from the newest entry.
    pub fn scroll_logs(&self, offset_from_tail: usize) {
        self.send(EngineCommand::ScrollLogs { offset_from_tail });
    }

    pub fn clear_logs(&self) {
        self.send(EngineCommand::ClearLogs);
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> AppViewModel {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<AppViewModel> {
        self.snapshots.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Cancels every task, closes the link and waits for all of them.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                stream_error!("Engine task ended abnormally: {}", err);
            }
        }
        stream_info!("Engine stopped");
    }

    fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            stream_warn!("Engine loop is gone; command dropped");
        }
    }
}

struct EngineLoop {
    config: EngineConfig,
    /// Only `None` while `update` runs.
    state: Option<AppState>,
    store: Arc<dyn ConversationStore>,
    sender: OutboundSender,
    snapshots: watch::Sender<AppViewModel>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut notices: mpsc::UnboundedReceiver<LinkNotice>,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
        mut failures: mpsc::UnboundedReceiver<(OutboundCommand, SendFailure)>,
        cancel: CancellationToken,
    ) {
        loop {
            // Unbiased: a busy inbound stream must not starve commands.
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(notice) = notices.recv() => self.notice_msg(notice),
                Some((command, failure)) = failures.recv() => Msg::SendFailed {
                    command,
                    reason: failure.to_string(),
                    at: self.config.now(),
                },
                Some(command) = commands.recv() => self.command_msg(command),
                else => break,
            };
            self.dispatch(msg);
        }
        stream_debug!("Engine loop stopped");
    }

    fn notice_msg(&self, notice: LinkNotice) -> Msg {
        match notice {
            LinkNotice::Frame(raw) => Msg::FrameReceived {
                raw,
                received_at: self.config.now(),
            },
            LinkNotice::State(state) => Msg::ConnectionChanged(state),
        }
    }

    fn command_msg(&self, command: EngineCommand) -> Msg {
        let at = self.config.now();
        match command {
            EngineCommand::NewConversation { title } => Msg::NewConversation { title, at },
            EngineCommand::SelectConversation(id) => Msg::SelectConversation(id),
            EngineCommand::DeleteConversation(id) => Msg::DeleteConversation(id),
            EngineCommand::SubmitTask { task, metadata } => Msg::SubmitTask {
                task,
                llm_model: self.config.llm_model.clone(),
                metadata,
                at,
            },
            EngineCommand::StartResearch { topic } => Msg::StartResearch {
                topic,
                task_id: format!("research-{}", at.timestamp_millis()),
                llm_model: self.config.llm_model.clone(),
                max_parallel_browsers: self.config.max_parallel_browsers,
                at,
            },
            EngineCommand::Control { action, task_id } => Msg::Control { action, task_id },
            EngineCommand::ScrollLogs { offset_from_tail } => Msg::LogScrolled { offset_from_tail },
            EngineCommand::ClearLogs => Msg::ClearLogs,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let Some(state) = self.state.take() else {
            stream_error!("Engine state missing; dropping input");
            return;
        };
        let (mut state, effects) = update(state, msg);
        for effect in effects {
            match effect {
                Effect::Transmit(command) => self.sender.enqueue(command),
                Effect::PersistConversations(conversations) => {
                    if let Err(err) = self.store.save(&conversations) {
                        stream_error!("Failed to save conversations: {}", err);
                    }
                }
            }
        }
        if state.consume_dirty() {
            self.snapshots.send_replace(state.view());
        }
        self.state = Some(state);
    }
}
