//! Connection actor: owns the link, the handshake and every reconnection timer.
//!
//! All lifecycle decisions happen on the actor's own task. The backoff
//! reconnect and the liveness watchdog are branches of the same `select!`
//! loop, so they can never race each other into two concurrent connects.
use std::sync::Arc;

use stream_logging::{stream_debug, stream_info, stream_trace, stream_warn};
use taskstream_core::{ConnectionState, OutboundCommand};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionSettings;
use crate::transport::{FrameSink, Link, Transport};
use crate::{LinkEvent, LinkNotice, SendError, TransportError};

enum ActorCommand {
    Connect,
    /// Connect unless the client disconnected on purpose.
    EnsureConnected,
    Disconnect,
    Send {
        frame: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
}

/// Cheap, cloneable access to a running [`ConnectionActor`].
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<ActorCommand>,
    state: watch::Receiver<ConnectionState>,
    held: watch::Receiver<bool>,
}

impl ConnectionHandle {
    /// Requests a connection. Does nothing while connecting or open.
    pub fn connect(&self) {
        let _ = self.commands.send(ActorCommand::Connect);
    }

    /// Connects on behalf of a pending send. Ignored after `disconnect()`
    /// until the next explicit `connect()`.
    pub fn ensure_connected(&self) {
        let _ = self.commands.send(ActorCommand::EnsureConnected);
    }

    /// Closes the link cleanly and stops all reconnection timers.
    pub fn disconnect(&self) {
        let _ = self.commands.send(ActorCommand::Disconnect);
    }

    /// True from `disconnect()` until the next `connect()`.
    pub fn is_held(&self) -> bool {
        *self.held.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Writes one frame on the open link.
    pub async fn send(&self, frame: String) -> Result<(), SendError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ActorCommand::Send { frame, reply })
            .map_err(|_| SendError::ActorGone)?;
        response.await.map_err(|_| SendError::ActorGone)?
    }
}

pub struct ConnectionActor {
    settings: ConnectionSettings,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedReceiver<ActorCommand>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    held_tx: watch::Sender<bool>,
    notices: mpsc::UnboundedSender<LinkNotice>,
    link_tx: mpsc::UnboundedSender<(u64, LinkEvent)>,
    link_rx: mpsc::UnboundedReceiver<(u64, LinkEvent)>,
    sink: Option<Box<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
    /// Incremented per link; events tagged with an older value are stale.
    generation: u64,
    reconnect_at: Option<Instant>,
    /// False until the first `connect()` and after `disconnect()`.
    wanted: bool,
    cancel: CancellationToken,
}

impl ConnectionActor {
    /// Spawns the actor on the current runtime.
    ///
    /// Frames and state changes are forwarded to `notices` in the order they
    /// happen. The actor stops when `cancel` fires or every handle is dropped.
    pub fn spawn(
        settings: ConnectionSettings,
        transport: Arc<dyn Transport>,
        notices: mpsc::UnboundedSender<LinkNotice>,
        cancel: CancellationToken,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (held_tx, held_rx) = watch::channel(false);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let actor = Self {
            settings,
            transport,
            commands,
            state: ConnectionState::Idle,
            state_tx,
            held_tx,
            notices,
            link_tx,
            link_rx,
            sink: None,
            reader: None,
            generation: 0,
            reconnect_at: None,
            wanted: false,
            cancel,
        };
        let task = tokio::spawn(actor.run());
        let handle = ConnectionHandle {
            commands: command_tx,
            state: state_rx,
            held: held_rx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        let period = self.settings.watchdog;
        let mut watchdog = time::interval_at(Instant::now() + period, period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let reconnect_at = self.reconnect_at;
            let reconnect = async move {
                match reconnect_at {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(ActorCommand::Connect) => {
                        self.held_tx.send_replace(false);
                        self.connect().await;
                    }
                    Some(ActorCommand::EnsureConnected) => {
                        let held = *self.held_tx.borrow();
                        if held {
                            stream_debug!("Not reconnecting for a send after disconnect()");
                        } else {
                            self.connect().await;
                        }
                    }
                    Some(ActorCommand::Disconnect) => self.disconnect().await,
                    Some(ActorCommand::Send { frame, reply }) => {
                        let _ = reply.send(self.transmit(frame).await);
                    }
                    None => break,
                },
                Some((generation, event)) = self.link_rx.recv() => {
                    self.on_link_event(generation, event);
                }
                _ = reconnect => {
                    self.reconnect_at = None;
                    stream_info!("Reconnecting to {}", self.settings.endpoint);
                    self.connect().await;
                }
                _ = watchdog.tick() => {
                    if self.wanted
                        && !self.state.is_connecting_or_open()
                        && self.reconnect_at.is_none()
                    {
                        stream_info!("Watchdog found connection {}; reconnecting", self.state);
                        self.connect().await;
                    }
                }
            }
        }

        self.disconnect().await;
        stream_debug!("Connection actor stopped");
    }

    async fn connect(&mut self) {
        if self.state.is_connecting_or_open() {
            stream_trace!("connect() ignored while {}", self.state);
            return;
        }
        self.wanted = true;
        self.generation += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.sink = None;
        self.set_state(ConnectionState::Connecting);

        let attempt = Self::open_link(
            self.settings.clone(),
            Arc::clone(&self.transport),
            self.cancel.clone(),
        );
        match attempt.await {
            Ok(Some(link)) => self.on_open(link),
            Ok(None) => {
                // Shutdown interrupted the attempt.
                self.set_state(ConnectionState::Closed);
            }
            Err(err) => {
                stream_warn!("Connecting to {} failed: {}", self.settings.endpoint, err);
                self.set_state(ConnectionState::Closed);
                self.schedule_reconnect();
            }
        }
    }

    /// Opens a link and sends the handshake. Takes owned parts so the future
    /// does not borrow the actor, whose sink is not `Sync`.
    async fn open_link(
        settings: ConnectionSettings,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<Option<Link>, TransportError> {
        let attempt = time::timeout(settings.connect_timeout, transport.open(&settings.endpoint));
        let mut link = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            opened = attempt => opened.map_err(|_| TransportError::Timeout)??,
        };

        let handshake = OutboundCommand::Handshake {
            client_id: settings.client_id,
        }
        .to_frame()
        .map_err(|err| TransportError::Send(err.to_string()))?;
        link.sink.send(handshake).await?;
        Ok(Some(link))
    }

    fn on_open(&mut self, link: Link) {
        let Link { sink, mut source } = link;
        let generation = self.generation;
        let events = self.link_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(event) = source.next_event().await {
                let last = matches!(event, LinkEvent::Closed { .. });
                if events.send((generation, event)).is_err() || last {
                    break;
                }
            }
        });

        self.sink = Some(sink);
        self.reader = Some(reader);
        self.reconnect_at = None;
        stream_info!("Connected to {}", self.settings.endpoint);
        self.set_state(ConnectionState::Open);
    }

    fn on_link_event(&mut self, generation: u64, event: LinkEvent) {
        if generation != self.generation {
            stream_trace!("Ignoring event from stale link {}", generation);
            return;
        }
        match event {
            LinkEvent::Frame(raw) => {
                let _ = self.notices.send(LinkNotice::Frame(raw));
            }
            LinkEvent::Error(err) => {
                stream_warn!("Transport error: {}", err);
                self.set_state(ConnectionState::Closed);
            }
            LinkEvent::Closed { clean } => {
                self.sink = None;
                self.reader = None;
                self.set_state(ConnectionState::Closed);
                if clean {
                    stream_info!("Server closed the connection");
                } else {
                    stream_warn!("Connection closed unexpectedly");
                    self.schedule_reconnect();
                }
            }
        }
    }

    async fn transmit(&mut self, frame: String) -> Result<(), SendError> {
        if !self.state.is_open() {
            return Err(SendError::NotOpen);
        }
        let sink = self.sink.as_mut().ok_or(SendError::NotOpen)?;
        match sink.send(frame).await {
            Ok(()) => Ok(()),
            Err(err) => {
                stream_warn!("Write failed: {}", err);
                self.set_state(ConnectionState::Closed);
                Err(SendError::Transport(err))
            }
        }
    }

    async fn disconnect(&mut self) {
        self.held_tx.send_replace(true);
        self.wanted = false;
        self.reconnect_at = None;
        // Anything the old link still reports is stale from here on.
        self.generation += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            self.set_state(ConnectionState::Closing);
            if let Err(err) = sink.close().await {
                stream_debug!("Close handshake failed: {}", err);
            }
        }
        if self.state != ConnectionState::Idle {
            self.set_state(ConnectionState::Closed);
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.wanted || self.reconnect_at.is_some() {
            return;
        }
        self.reconnect_at = Some(Instant::now() + self.settings.backoff);
        stream_info!("Reconnect scheduled in {:?}", self.settings.backoff);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        stream_debug!("Connection {} -> {}", self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
        let _ = self.notices.send(LinkNotice::State(state));
    }
}
