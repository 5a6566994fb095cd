//! Session lifecycle tests against a scripted in-memory relay.

use async_trait::async_trait;
use k9::assert_equal;
use relaywallet_host::{
    settle_pairing, AutoApprover, Connector, EnvelopeChannel, FakeConnector, FakeRelay,
    HandlerResult, PairingDecision, RejectingApprover, RequestError, RequestRouter, SessionError,
    SessionState, TransportError, WalletSession,
};
use relaywallet_pairing::{ConfigError, PairingParameters, WalletMeta};
use relaywallet_proto::{Envelope, EnvelopeKind, RequestPayload};
use relaywallet_signer::WalletKey;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const URI: &str = "wc:8a5e5bdc-a0e4-4702-ba63-8f1a5655744f@1?bridge=https%3A%2F%2Fbridge.test&key=41791102999c339c844880b23950704cc43aa840f3739e365323cda4dfa89e7a";
const TOPIC: &str = "8a5e5bdc-a0e4-4702-ba63-8f1a5655744f";
const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

fn session() -> WalletSession {
    let params = PairingParameters::parse(URI).unwrap();
    WalletSession::new(params, WalletMeta::default()).with_client_id("wallet-client")
}

fn pairing_request() -> Envelope {
    Envelope::publish(
        TOPIC,
        json!({
            "peerId": "dapp-peer",
            "peerMeta": {
                "name": "Example dApp",
                "url": "https://dapp.test",
                "description": "test",
                "icons": []
            },
            "chainId": 1
        }),
    )
}

async fn next_sent(relay: &mut FakeRelay) -> Envelope {
    tokio::time::timeout(Duration::from_secs(2), relay.next_sent())
        .await
        .expect("timed out waiting for outbound envelope")
        .expect("outbound channel closed")
}

fn address() -> alloy_primitives::Address {
    WalletKey::from_hex(KEY).unwrap().address()
}

/// Open a session and bring it to Active, draining the handshake traffic.
async fn active_session(connector: &FakeConnector, relay: &mut FakeRelay) -> WalletSession {
    let mut session = session();
    session.open(connector).await.unwrap();
    next_sent(relay).await;
    relay.deliver(pairing_request());
    session.wait_for_pairing_request().await.unwrap();
    session.approve(address(), 1).await.unwrap();
    next_sent(relay).await;
    session
}

#[tokio::test]
async fn open_subscribes_to_handshake_topic() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    assert_equal!(session.state(), SessionState::Disconnected);

    session.open(&connector).await.unwrap();
    assert_equal!(session.state(), SessionState::Subscribed);
    assert_equal!(relay.connected_urls(), vec!["https://bridge.test".to_string()]);

    let sub = next_sent(&mut relay).await;
    assert_equal!(sub.kind, EnvelopeKind::Subscribe);
    assert_equal!(sub.topic, TOPIC);
    assert_equal!(sub.payload, None);
}

#[tokio::test]
async fn failed_connect_leaves_session_disconnected() {
    let (connector, relay) = FakeConnector::pair();
    relay.refuse_connections("connection refused");

    let mut session = session();
    match session.open(&connector).await {
        Err(SessionError::Connection(TransportError::Connect { reason, .. })) => {
            assert_equal!(reason, "connection refused");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_equal!(session.state(), SessionState::Disconnected);

    session.open(&connector).await.unwrap();
    assert_equal!(session.state(), SessionState::Subscribed);
}

#[test]
fn from_uri_builds_session_for_topic() {
    let session = WalletSession::from_uri(
        "wc:abc-topic@1?key=00ff",
        "wss://fallback.test",
        WalletMeta::default(),
    )
    .unwrap();
    assert_equal!(session.params().handshake_topic, "abc-topic");
    assert_equal!(session.params().bridge, "wss://fallback.test");
    assert_equal!(session.state(), SessionState::Disconnected);
    assert!(!session.client_id().is_empty());

    let fixed = session.with_client_id("wallet-client");
    assert_equal!(fixed.client_id(), "wallet-client");
}

#[test]
fn from_uri_reports_bad_uri_as_config_error() {
    let result = WalletSession::from_uri("wc:no-query", "wss://fallback.test", WalletMeta::default());
    assert!(matches!(
        result,
        Err(SessionError::Config(ConfigError::InvalidUriFormat(_)))
    ));
}

/// Never finishes connecting.
struct StalledConnector;

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn EnvelopeChannel>, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn close_abandons_stalled_connect() {
    let mut session = session();
    let closer = session.closer();

    let opening = tokio::spawn(async move {
        let result = session.open(&StalledConnector).await;
        (session, result)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    closer.close();

    let (session, result) = tokio::time::timeout(Duration::from_secs(1), opening)
        .await
        .expect("pending connect was not abandoned")
        .unwrap();
    assert!(matches!(result, Err(SessionError::Closed)));
    assert_equal!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn pairing_request_skips_other_traffic() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;

    relay.deliver(Envelope {
        topic: TOPIC.to_string(),
        kind: EnvelopeKind::Other("ack".to_string()),
        payload: None,
    });
    relay.deliver(Envelope::subscribe(TOPIC));
    relay.deliver(Envelope::publish("some-other-topic", json!({"chainId": 7})));
    relay.deliver(pairing_request());

    let request = session.wait_for_pairing_request().await.unwrap();
    assert_equal!(request.peer_id, "dapp-peer");
    assert_equal!(request.peer_meta.name, "Example dApp");
    assert_equal!(request.chain_id, 1);
    assert_equal!(session.state(), SessionState::AwaitingApproval);
    assert_equal!(session.peer().map(|p| p.peer_id.as_str()), Some("dapp-peer"));
}

#[tokio::test]
async fn unparseable_pairing_request_keeps_session_subscribed() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;

    relay.deliver(Envelope::publish(TOPIC, json!({"peerId": 5})));
    assert!(matches!(
        session.wait_for_pairing_request().await,
        Err(SessionError::Parse(_))
    ));
    assert_equal!(session.state(), SessionState::Subscribed);

    relay.deliver_raw("{not json");
    assert!(matches!(
        session.wait_for_pairing_request().await,
        Err(SessionError::Parse(_))
    ));
    assert_equal!(session.state(), SessionState::Subscribed);

    relay.deliver(pairing_request());
    session.wait_for_pairing_request().await.unwrap();
    assert_equal!(session.state(), SessionState::AwaitingApproval);
}

#[tokio::test]
async fn approve_publishes_accounts_on_handshake_topic() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;
    relay.deliver(pairing_request());
    session.wait_for_pairing_request().await.unwrap();

    session.approve(address(), 1).await.unwrap();
    assert_equal!(session.state(), SessionState::Active);

    let approval = next_sent(&mut relay).await;
    assert_equal!(approval.kind, EnvelopeKind::Publish);
    assert_equal!(approval.topic, TOPIC);
    assert_equal!(
        approval.payload.unwrap(),
        json!({
            "approved": true,
            "chainId": 1,
            "accounts": [ADDRESS],
            "peerId": "wallet-client",
            "peerMeta": {
                "name": "relaywallet",
                "description": "Console wallet with a locally held key",
                "icons": []
            }
        })
    );
}

#[tokio::test]
async fn approve_requires_pending_request() {
    let (connector, _relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();

    match session.approve(address(), 1).await {
        Err(SessionError::InvalidState { state, .. }) => {
            assert_equal!(state, SessionState::Subscribed);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_equal!(session.state(), SessionState::Subscribed);
}

#[tokio::test]
async fn reject_publishes_refusal_and_closes() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;
    relay.deliver(pairing_request());

    let approver = RejectingApprover {
        reason: "not today".to_string(),
    };
    let decision = settle_pairing(&mut session, &approver, address())
        .await
        .unwrap();
    assert!(!decision.is_approved());

    let refusal = next_sent(&mut relay).await;
    let payload = refusal.payload.unwrap();
    assert_equal!(payload["approved"], json!(false));
    assert_equal!(payload["accounts"], json!([]));
    assert_equal!(session.state(), SessionState::Closed);
    assert!(relay.is_closed());
}

#[tokio::test]
async fn settle_pairing_waits_past_bad_requests() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;

    relay.deliver(Envelope::publish(TOPIC, json!("garbage")));
    relay.deliver(pairing_request());

    let approver = AutoApprover {
        chain_override: Some(137),
    };
    let decision = settle_pairing(&mut session, &approver, address())
        .await
        .unwrap();
    assert_equal!(decision, PairingDecision::Approve { chain_id: 137 });
    assert_equal!(session.state(), SessionState::Active);

    let approval = next_sent(&mut relay).await;
    assert_equal!(approval.payload.unwrap()["chainId"], json!(137));
}

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

fn recording_router(calls: &Calls) -> RequestRouter {
    let mut router = RequestRouter::new();
    let c = calls.clone();
    router.register("personal_sign", move |payload: &Value| -> HandlerResult {
        c.lock().unwrap().push(("personal_sign".to_string(), payload.clone()));
        Ok(json!("0xsig"))
    });
    let c = calls.clone();
    router.register("eth_sign", move |payload: &Value| -> HandlerResult {
        c.lock().unwrap().push(("eth_sign".to_string(), payload.clone()));
        Err(RequestError::Parse("no data".to_string()))
    });
    router
}

async fn wait_for_calls(calls: &Calls, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while calls.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("handlers were not invoked in time");
}

#[tokio::test]
async fn run_dispatches_until_closed() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = active_session(&connector, &mut relay).await;
    let closer = session.closer();
    let calls: Calls = Arc::default();
    let router = recording_router(&calls);

    relay.deliver(RequestPayload::new("eth_sendTransaction", json!({})).into_envelope(TOPIC));
    relay.deliver(
        RequestPayload::new("personal_sign", json!({"message": "Hello"})).into_envelope(TOPIC),
    );
    relay.deliver_raw("][");
    relay.deliver(Envelope::publish(TOPIC, json!({"payload": {}})));
    relay.deliver(RequestPayload::new("eth_sign", json!({"data": "0x456"})).into_envelope(""));

    let run = tokio::spawn(async move {
        let result = session.run(&router).await;
        (session, result)
    });

    wait_for_calls(&calls, 2).await;
    closer.close();

    let (session, result) = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not stop after close")
        .unwrap();
    let stats = result.unwrap();
    assert_equal!(stats.handled, 1);
    assert_equal!(stats.failed, 1);
    assert_equal!(stats.dropped, 1);
    assert_equal!(stats.malformed, 2);
    assert_equal!(session.state(), SessionState::Closed);
    assert!(relay.is_closed());

    let calls = calls.lock().unwrap();
    assert_equal!(
        *calls,
        vec![
            ("personal_sign".to_string(), json!({"message": "Hello"})),
            ("eth_sign".to_string(), json!({"data": "0x456"})),
        ]
    );
}

#[tokio::test]
async fn transport_failure_ends_run_with_connection_error() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = active_session(&connector, &mut relay).await;
    let router = RequestRouter::new();

    relay.fail(TransportError::Receive("reset by peer".to_string()));
    let result = tokio::time::timeout(Duration::from_secs(2), session.run(&router))
        .await
        .unwrap();
    assert!(matches!(result, Err(SessionError::Connection(TransportError::Receive(_)))));
    assert_equal!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn run_requires_active_session() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;
    assert!(matches!(
        session.run(&RequestRouter::new()).await,
        Err(SessionError::InvalidState { .. })
    ));
    assert_equal!(session.state(), SessionState::Subscribed);
    assert!(relay.try_next_sent().is_none());
}

#[tokio::test]
async fn close_unblocks_pending_wait() {
    let (connector, mut relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    next_sent(&mut relay).await;
    let closer = session.closer();

    let waiting = tokio::spawn(async move {
        let result = session.wait_for_pairing_request().await;
        (session, result)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    closer.close();

    let (session, result) = tokio::time::timeout(Duration::from_secs(1), waiting)
        .await
        .expect("blocked receive was not released")
        .unwrap();
    assert!(matches!(result, Err(SessionError::Closed)));
    assert_equal!(session.state(), SessionState::Closed);
    assert!(relay.is_closed());
}

#[tokio::test]
async fn close_is_idempotent() {
    let (connector, relay) = FakeConnector::pair();
    let mut session = session();
    session.open(&connector).await.unwrap();
    let closer = session.closer();

    session.close().await;
    session.close().await;
    closer.close();
    assert!(closer.is_closed());
    assert_equal!(session.state(), SessionState::Closed);
    assert!(relay.is_closed());

    assert!(matches!(
        session.wait_for_pairing_request().await,
        Err(SessionError::Closed)
    ));
}
