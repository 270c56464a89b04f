use std::fmt;

use taskstream_core::ConnectionState;
use thiserror::Error;

/// Failure of the underlying duplex link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not open connection: {0}")]
    Connect(String),
    #[error("connection attempt timed out")]
    Timeout,
    #[error("stream error: {0}")]
    Stream(String),
    #[error("failed to write frame: {0}")]
    Send(String),
    #[error("connection is closed")]
    Closed,
}

/// One attempt to hand a frame to the connection actor failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection is not open")]
    NotOpen,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection actor has stopped")]
    ActorGone,
}

/// Terminal outcome of the outbound sender for one command.
#[derive(Debug, Error)]
pub enum SendFailure {
    #[error("could not encode command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: SendError },
    #[error("connection was closed by the client")]
    Disconnected,
    #[error("send cancelled by shutdown")]
    Cancelled,
}

impl SendFailure {
    /// Cancelled sends are not reported to the user.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, SendFailure::Cancelled)
    }
}

/// Something the transport reported about a live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(String),
    Error(TransportError),
    /// The link ended. `clean` is true only for a normal close handshake.
    Closed { clean: bool },
}

/// What the connection actor forwards to the engine loop, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotice {
    Frame(String),
    State(ConnectionState),
}

impl fmt::Display for LinkNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkNotice::Frame(raw) => write!(f, "frame ({} bytes)", raw.len()),
            LinkNotice::State(state) => write!(f, "state {state}"),
        }
    }
}
