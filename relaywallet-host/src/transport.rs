use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use relaywallet_proto::{Envelope, EnvelopeError};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    /// A frame arrived but did not hold a well-formed envelope. The
    /// connection itself is still usable.
    #[error(transparent)]
    Malformed(#[from] EnvelopeError),
    #[error("relay connection closed")]
    Closed,
}

/// One open connection to a relay, speaking whole envelopes.
///
/// `recv` must be cancel safe: the session races it against cancellation
/// and drops the future when cancellation wins.
#[async_trait]
pub trait EnvelopeChannel: Send {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError>;
    async fn recv(&mut self) -> Result<Envelope, TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn EnvelopeChannel>, TransportError>;
}

/// Connects over WebSocket, one JSON envelope per text frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn EnvelopeChannel>, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        info!("connecting to relay {parsed}");
        let (stream, _) = connect_async(parsed.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        info!("connected to relay {parsed}");

        Ok(Box::new(WebSocketChannel { stream }))
    }
}

pub struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EnvelopeChannel for WebSocketChannel {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let text = envelope.to_json()?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(Envelope::from_json(&text)?),
                Some(Ok(Message::Binary(data))) => return Ok(Envelope::from_slice(&data)?),
                Some(Ok(other)) => debug!("ignoring control frame {other:?}"),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}

/// In-memory relay for tests. Hands out a single channel whose inbound
/// side is fed by [`FakeRelay`] and whose outbound envelopes are recorded.
pub struct FakeConnector {
    shared: Arc<FakeShared>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Result<Envelope, TransportError>>>>,
}

/// Test-side handle of a [`FakeConnector`].
pub struct FakeRelay {
    shared: Arc<FakeShared>,
    inbound: mpsc::UnboundedSender<Result<Envelope, TransportError>>,
    outbound: mpsc::UnboundedReceiver<Envelope>,
}

struct FakeShared {
    refuse: Mutex<Option<String>>,
    urls: Mutex<Vec<String>>,
    closed: Mutex<bool>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl FakeConnector {
    pub fn pair() -> (Self, FakeRelay) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(FakeShared {
            refuse: Mutex::new(None),
            urls: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            outbound: outbound_tx,
        });
        (
            Self {
                shared: shared.clone(),
                inbound: Mutex::new(Some(inbound_rx)),
            },
            FakeRelay {
                shared,
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }
}

impl FakeRelay {
    /// Make the next `connect` fail with `reason`.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        *self.shared.refuse.lock().unwrap() = Some(reason.into());
    }

    pub fn deliver(&self, envelope: Envelope) {
        let _ = self.inbound.send(Ok(envelope));
    }

    /// Deliver a raw text frame, parsed the way a WebSocket channel would.
    pub fn deliver_raw(&self, text: &str) {
        let item = match Envelope::from_json(text) {
            Ok(envelope) => Ok(envelope),
            Err(e) => Err(TransportError::Malformed(e)),
        };
        let _ = self.inbound.send(item);
    }

    pub fn fail(&self, error: TransportError) {
        let _ = self.inbound.send(Err(error));
    }

    /// Wait for the next envelope the session sends.
    pub async fn next_sent(&mut self) -> Option<Envelope> {
        self.outbound.recv().await
    }

    pub fn try_next_sent(&mut self) -> Option<Envelope> {
        self.outbound.try_recv().ok()
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.shared.urls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.lock().unwrap()
    }
}

struct FakeChannel {
    shared: Arc<FakeShared>,
    inbound: mpsc::UnboundedReceiver<Result<Envelope, TransportError>>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn EnvelopeChannel>, TransportError> {
        if let Some(reason) = self.shared.refuse.lock().unwrap().take() {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason,
            });
        }
        let inbound = self
            .inbound
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Connect {
                url: url.to_string(),
                reason: "fake relay already connected".to_string(),
            })?;
        self.shared.urls.lock().unwrap().push(url.to_string());
        Ok(Box::new(FakeChannel {
            shared: self.shared.clone(),
            inbound,
        }))
    }
}

#[async_trait]
impl EnvelopeChannel for FakeChannel {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        if *self.shared.closed.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        self.shared
            .outbound
            .send(envelope.clone())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        match self.inbound.recv().await {
            Some(item) => item,
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        *self.shared.closed.lock().unwrap() = true;
        self.inbound.close();
        Ok(())
    }
}
