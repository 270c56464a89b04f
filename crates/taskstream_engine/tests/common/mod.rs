#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use taskstream_core::AppViewModel;
use taskstream_engine::{
    EngineHandle, FrameSink, FrameSource, Link, LinkEvent, Transport, TransportError,
};
use tokio::sync::mpsc;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(stream_logging::initialize_for_tests);
}

/// In-memory transport whose server side is driven by the test.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    refuse: AtomicBool,
    opens: AtomicUsize,
    links: std::sync::Mutex<Option<mpsc::UnboundedSender<ServerLink>>>,
}

/// Server end of one opened link.
pub struct ServerLink {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl ServerLink {
    pub fn push(&self, raw: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Frame(raw.into()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self
            .events
            .send(LinkEvent::Error(TransportError::Stream(message.to_string())));
    }

    pub fn close(&self, clean: bool) {
        let _ = self.events.send(LinkEvent::Closed { clean });
    }

    /// Next frame the client wrote on this link.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }
}

impl ScriptedTransport {
    /// Transport plus the receiver of every link it opens.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerLink>) {
        let transport = Self::default();
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        if let Ok(mut links) = transport.shared.links.lock() {
            *links = Some(links_tx);
        }
        (transport, links_rx)
    }

    pub fn refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Open attempts so far, successful or not.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _endpoint: &str) -> Result<Link, TransportError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let server = ServerLink {
            sent: sent_rx,
            events: events_tx,
        };
        if let Ok(links) = self.shared.links.lock() {
            if let Some(links) = links.as_ref() {
                let _ = links.send(server);
            }
        }
        Ok(Link {
            sink: Box::new(ScriptedSink { sent: sent_tx }),
            source: Box::new(ScriptedSource {
                events: events_rx,
                done: false,
            }),
        })
    }
}

struct ScriptedSink {
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sent.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct ScriptedSource {
    events: mpsc::UnboundedReceiver<LinkEvent>,
    done: bool,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<LinkEvent> {
        if self.done {
            return None;
        }
        let event = self
            .events
            .recv()
            .await
            .unwrap_or(LinkEvent::Closed { clean: false });
        if matches!(event, LinkEvent::Closed { .. }) {
            self.done = true;
        }
        Some(event)
    }
}

/// Waits until a published snapshot satisfies `predicate`.
pub async fn wait_for_view(
    engine: &EngineHandle,
    predicate: impl FnMut(&AppViewModel) -> bool,
) -> AppViewModel {
    let mut views = engine.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(120), views.wait_for(predicate))
        .await
        .expect("snapshot condition not reached in time")
        .expect("engine stopped publishing");
    view.clone()
}

pub fn frame(kind: &str, data: serde_json::Value) -> String {
    serde_json::json!({ "type": kind, "data": data }).to_string()
}
