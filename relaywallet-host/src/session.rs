use alloy_primitives::Address;
use log::{debug, error, info, warn};
use relaywallet_pairing::{ApprovalPayload, PairingParameters, PairingRequest, WalletMeta};
use relaywallet_proto::{Envelope, RequestPayload};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SessionError;
use crate::router::{Dispatch, RequestRouter};
use crate::transport::{Connector, EnvelopeChannel, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    AwaitingApproval,
    Active,
    Closed,
}

/// Counts kept by [`WalletSession::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: usize,
    pub failed: usize,
    /// Requests for methods nobody registered.
    pub dropped: usize,
    /// Frames or request bodies that could not be parsed.
    pub malformed: usize,
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "handled={} failed={} dropped={} malformed={}",
            self.handled, self.failed, self.dropped, self.malformed
        )
    }
}

/// Closes a session from another task. Closing is idempotent and wakes any
/// receive the session is blocked in.
#[derive(Debug, Clone)]
pub struct SessionCloser {
    token: CancellationToken,
}

impl SessionCloser {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum Received {
    Envelope(Envelope),
    Failed(TransportError),
    Cancelled,
}

/// A wallet-side relay session for one pairing.
pub struct WalletSession {
    params: PairingParameters,
    client_id: String,
    wallet_meta: WalletMeta,
    state: SessionState,
    channel: Option<Box<dyn EnvelopeChannel>>,
    cancel: CancellationToken,
    peer: Option<PairingRequest>,
}

impl WalletSession {
    pub fn new(params: PairingParameters, wallet_meta: WalletMeta) -> Self {
        Self {
            params,
            client_id: Uuid::new_v4().to_string(),
            wallet_meta,
            state: SessionState::Disconnected,
            channel: None,
            cancel: CancellationToken::new(),
            peer: None,
        }
    }

    /// Parse a pairing URI and build a session for it. Bridge-less URIs use
    /// `default_bridge`.
    pub fn from_uri(
        uri: &str,
        default_bridge: &str,
        wallet_meta: WalletMeta,
    ) -> Result<Self, SessionError> {
        let params = PairingParameters::parse_with_default(uri, default_bridge)?;
        Ok(Self::new(params, wallet_meta))
    }

    /// Use a fixed client id instead of a random one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn state(&self) -> SessionState {
        if self.cancel.is_cancelled() {
            SessionState::Closed
        } else {
            self.state
        }
    }

    pub fn params(&self) -> &PairingParameters {
        &self.params
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The application that asked to pair, once its request arrived.
    pub fn peer(&self) -> Option<&PairingRequest> {
        self.peer.as_ref()
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            token: self.cancel.clone(),
        }
    }

    /// Connect to the bridge and subscribe to the handshake topic. Closing
    /// the session while the connect is pending abandons it.
    pub async fn open(&mut self, connector: &dyn Connector) -> Result<(), SessionError> {
        self.expect_state(SessionState::Disconnected, "open")?;
        self.state = SessionState::Connecting;

        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = connector.connect(&self.params.bridge) => Some(result),
        };
        let mut channel = match connected {
            Some(Ok(channel)) => channel,
            None => {
                info!("closed while connecting to {}", self.params.bridge);
                self.state = SessionState::Closed;
                return Err(SessionError::Closed);
            }
            Some(Err(e)) => {
                error!("failed to reach bridge {}: {e}", self.params.bridge);
                self.state = SessionState::Disconnected;
                return Err(SessionError::Connection(e));
            }
        };

        let subscribe = Envelope::subscribe(self.params.handshake_topic.clone());
        if let Err(e) = channel.send(&subscribe).await {
            error!("subscribe to {} failed: {e}", self.params.handshake_topic);
            let _ = channel.close().await;
            self.state = SessionState::Disconnected;
            return Err(SessionError::Connection(e));
        }

        info!(
            "subscribed to handshake topic {} on {}",
            self.params.handshake_topic, self.params.bridge
        );
        self.channel = Some(channel);
        self.state = SessionState::Subscribed;
        Ok(())
    }

    /// Block until the application publishes its pairing request on the
    /// handshake topic. Envelopes of other kinds or topics are skipped.
    ///
    /// A request that cannot be parsed yields [`SessionError::Parse`] and
    /// leaves the session subscribed, so the caller may wait again.
    pub async fn wait_for_pairing_request(&mut self) -> Result<PairingRequest, SessionError> {
        self.expect_state(SessionState::Subscribed, "wait_for_pairing_request")?;

        loop {
            let envelope = match self.receive().await {
                Received::Envelope(envelope) => envelope,
                Received::Cancelled => {
                    self.shutdown().await;
                    return Err(SessionError::Closed);
                }
                Received::Failed(TransportError::Malformed(e)) => {
                    warn!("unparseable frame while waiting for pairing: {e}");
                    return Err(SessionError::Parse(e.to_string()));
                }
                Received::Failed(e) => {
                    error!("relay connection lost while waiting for pairing: {e}");
                    self.shutdown().await;
                    return Err(SessionError::Connection(e));
                }
            };

            if !envelope.is_publish() {
                debug!("ignoring {:?} envelope", envelope.kind.as_str());
                continue;
            }
            if !envelope.is_for_topic(&self.params.handshake_topic) {
                debug!("ignoring publish on foreign topic {}", envelope.topic);
                continue;
            }

            let payload = envelope
                .require_payload()
                .map_err(|e| SessionError::Parse(e.to_string()))?;
            let request = PairingRequest::deserialize(payload)
                .map_err(|e| SessionError::Parse(format!("pairing request: {e}")))?;

            info!(
                "pairing requested by {:?} ({}) on chain {}",
                request.peer_meta.name, request.peer_meta.url, request.chain_id
            );
            self.peer = Some(request.clone());
            self.state = SessionState::AwaitingApproval;
            return Ok(request);
        }
    }

    /// Accept the pending pairing, exposing `account` on `chain_id`.
    pub async fn approve(&mut self, account: Address, chain_id: u64) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingApproval, "approve")?;

        let payload = ApprovalPayload::approved(
            account.to_checksum(None),
            chain_id,
            &self.client_id,
            self.wallet_meta.clone(),
        );
        self.publish_handshake(&payload).await?;

        info!("pairing approved for {account} on chain {chain_id}");
        self.state = SessionState::Active;
        Ok(())
    }

    /// Decline the pending pairing and close the session.
    pub async fn reject(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingApproval, "reject")?;

        let payload = ApprovalPayload::rejected(&self.client_id, self.wallet_meta.clone());
        let sent = self.publish_handshake(&payload).await;
        info!("pairing rejected");
        self.close().await;
        sent
    }

    /// Receive and dispatch requests until the session is closed or the
    /// relay connection fails. `Ok` carries the counts of a session that
    /// ended by cancellation; a transport failure is returned as
    /// [`SessionError::Connection`].
    pub async fn run(&mut self, router: &RequestRouter) -> Result<DispatchStats, SessionError> {
        self.expect_state(SessionState::Active, "run")?;
        info!("dispatching requests for {:?}", router.methods());

        let mut stats = DispatchStats::default();
        let outcome = loop {
            let envelope = match self.receive().await {
                Received::Envelope(envelope) => envelope,
                Received::Cancelled => break Ok(stats),
                Received::Failed(TransportError::Malformed(e)) => {
                    warn!("dropping unparseable frame: {e}");
                    stats.malformed += 1;
                    continue;
                }
                Received::Failed(e) => {
                    error!("relay connection lost: {e}");
                    break Err(SessionError::Connection(e));
                }
            };

            if !envelope.is_publish() {
                debug!("ignoring {:?} envelope", envelope.kind.as_str());
                continue;
            }

            let request = match RequestPayload::from_envelope(&envelope) {
                Ok(request) => request,
                Err(e) => {
                    warn!("dropping request on {}: {e}", envelope.topic);
                    stats.malformed += 1;
                    continue;
                }
            };

            match router.dispatch(&request.method, &request.payload) {
                Dispatch::Handled(Ok(result)) => {
                    stats.handled += 1;
                    info!("{} -> {}", request.method, summarize(&result));
                }
                Dispatch::Handled(Err(e)) => {
                    stats.failed += 1;
                    warn!("{} failed: {e}", request.method);
                }
                Dispatch::Unregistered => {
                    stats.dropped += 1;
                    debug!("no handler for {}", request.method);
                }
            }
        };

        info!("session finished: {stats}");
        self.shutdown().await;
        outcome
    }

    /// Cancel any pending receive and release the connection. Safe to call
    /// more than once.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!("error closing relay connection: {e}");
            }
            info!("session on {} closed", self.params.handshake_topic);
        }
        self.state = SessionState::Closed;
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        match self.state() {
            state if state == expected => Ok(()),
            SessionState::Closed => Err(SessionError::Closed),
            state => Err(SessionError::InvalidState { operation, state }),
        }
    }

    async fn receive(&mut self) -> Received {
        let Some(channel) = self.channel.as_mut() else {
            return Received::Cancelled;
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Received::Cancelled,
            result = channel.recv() => match result {
                Ok(envelope) => Received::Envelope(envelope),
                Err(e) => Received::Failed(e),
            },
        }
    }

    async fn publish_handshake(&mut self, payload: &ApprovalPayload) -> Result<(), SessionError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| SessionError::Parse(format!("approval payload: {e}")))?;
        let envelope = Envelope::publish(self.params.handshake_topic.clone(), body);

        let channel = self.channel.as_mut().ok_or(SessionError::Closed)?;
        if let Err(e) = channel.send(&envelope).await {
            error!("publishing to {} failed: {e}", self.params.handshake_topic);
            self.shutdown().await;
            return Err(SessionError::Connection(e));
        }
        Ok(())
    }
}

fn summarize(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 80 {
        format!("{}...", text.chars().take(77).collect::<String>())
    } else {
        text
    }
}
