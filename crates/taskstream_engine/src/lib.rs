//! Taskstream engine: connection lifecycle, outbound delivery and the event loop
//! that drives the pure core.
mod config;
mod connection;
mod engine;
mod persist;
mod sender;
mod transport;
mod types;

pub use config::{
    Clock, ConfigError, ConnectionSettings, EngineConfig, DEFAULT_ENDPOINT, DEFAULT_LLM_MODEL,
};
pub use connection::{ConnectionActor, ConnectionHandle};
pub use engine::EngineHandle;
pub use persist::{
    ensure_state_dir, AtomicFileWriter, ConversationStore, MemoryConversationStore, PersistError,
};
pub use sender::{send_with_retry, OutboundSender, RetryPolicy};
pub use transport::{FrameSink, FrameSource, Link, Transport, WsTransport};
pub use types::{LinkEvent, LinkNotice, SendError, SendFailure, TransportError};
