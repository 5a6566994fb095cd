use k9::assert_equal;
use relaywallet_proto::{Envelope, EnvelopeKind, RequestPayload, TransactionRequest};
use serde_json::json;

#[test]
fn subscribe_envelope_has_no_payload_field() {
    let env = Envelope::subscribe("handshake-topic");
    let v: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();

    assert_equal!(v, json!({ "topic": "handshake-topic", "type": "sub" }));
}

#[test]
fn publish_envelope_wire_shape() {
    let env = Envelope::publish("t", json!({ "approved": true }));
    let v: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();

    assert_equal!(v["type"], "pub");
    assert_equal!(v["topic"], "t");
    assert_equal!(v["payload"]["approved"], true);
}

#[test]
fn unknown_kind_is_preserved() {
    let env = Envelope::from_json(r#"{"topic":"t","type":"ack"}"#).unwrap();
    assert_equal!(env.kind, EnvelopeKind::Other("ack".to_string()));
    assert!(!env.is_publish());

    let v: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
    assert_equal!(v["type"], "ack");
}

#[test]
fn missing_topic_defaults_to_empty() {
    let env = Envelope::from_json(r#"{"type":"pub","payload":{"peerId":"p"}}"#).unwrap();
    assert_equal!(env.topic, "");
    assert!(env.is_for_topic("anything"));
}

#[test]
fn topic_mismatch_is_detected() {
    let env = Envelope::publish("other", json!({}));
    assert!(!env.is_for_topic("mine"));
    assert!(env.is_for_topic("other"));
}

#[test]
fn malformed_json_is_an_error() {
    assert!(Envelope::from_json("not json").is_err());
    assert!(Envelope::from_json(r#"{"topic":"t"}"#).is_err());
}

#[test]
fn request_payload_from_envelope() {
    let env = RequestPayload::new("personal_sign", json!(["0x68656c6c6f", "0xabc"]))
        .into_envelope("session");
    let req = RequestPayload::from_envelope(&env).unwrap();

    assert_equal!(req.method, "personal_sign");
    assert_equal!(req.payload, json!(["0x68656c6c6f", "0xabc"]));
}

#[test]
fn request_payload_requires_a_body() {
    let env = Envelope::subscribe("session");
    assert!(RequestPayload::from_envelope(&env).is_err());
}

#[test]
fn transaction_request_reads_gas_field() {
    let tx: TransactionRequest = serde_json::from_value(json!({
        "from": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
        "to": "0x0000000000000000000000000000000000000001",
        "gas": "0x5208",
        "gasPrice": "0x3b9aca00",
    }))
    .unwrap();

    assert_equal!(tx.gas_limit, "0x5208");
    assert_equal!(tx.gas_price, "0x3b9aca00");
    assert_equal!(tx.data, "");
}
