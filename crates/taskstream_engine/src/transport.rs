//! Duplex text-frame transport and its WebSocket implementation.
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use stream_logging::{stream_debug, stream_warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{LinkEvent, TransportError};

/// Opens links to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Link, TransportError>;
}

/// Write half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;
    /// Starts a normal close handshake.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an open link.
#[async_trait]
pub trait FrameSource: Send {
    /// Next event on the link; `None` after [`LinkEvent::Closed`] was returned.
    async fn next_event(&mut self) -> Option<LinkEvent>;
}

pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &str) -> Result<Link, TransportError> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        stream_debug!("WebSocket upgrade to {} answered {}", endpoint, response.status());
        let (sink, source) = stream.split();
        Ok(Link {
            sink: Box::new(WsSink { inner: sink }),
            source: Box::new(WsSource {
                inner: source,
                failed: false,
                finished: false,
            }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(frame.into()))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client shutdown".into(),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
    failed: bool,
    finished: bool,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> Option<LinkEvent> {
        if self.finished {
            return None;
        }
        if self.failed {
            self.finished = true;
            return Some(LinkEvent::Closed { clean: false });
        }
        loop {
            let event = match self.inner.next().await {
                Some(Ok(Message::Text(text))) => LinkEvent::Frame(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => LinkEvent::Frame(text),
                    Err(_) => {
                        stream_warn!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len());
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.finished = true;
                    let clean = frame
                        .as_ref()
                        .is_some_and(|frame| frame.code == CloseCode::Normal);
                    LinkEvent::Closed { clean }
                }
                // Ping, pong and raw frames carry nothing for us.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.failed = true;
                    LinkEvent::Error(TransportError::Stream(err.to_string()))
                }
                None => {
                    self.finished = true;
                    LinkEvent::Closed { clean: false }
                }
            };
            return Some(event);
        }
    }
}
