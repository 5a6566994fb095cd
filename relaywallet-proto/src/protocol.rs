use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::{Envelope, EnvelopeError};

pub const METHOD_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const METHOD_ETH_SIGN: &str = "eth_sign";
pub const METHOD_PERSONAL_SIGN: &str = "personal_sign";
pub const METHOD_SIGN_TYPED_DATA: &str = "eth_signTypedData";

/// Body of a publish envelope sent by the application once a session is
/// active: a method name plus a payload only the handler interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(rename = "type")]
    pub method: String,
    #[serde(default)]
    pub payload: Value,
}

impl RequestPayload {
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, EnvelopeError> {
        let body = envelope.require_payload()?;
        Ok(Self::deserialize(body)?)
    }

    pub fn into_envelope(self, topic: impl Into<String>) -> Envelope {
        Envelope::publish(
            topic,
            serde_json::json!({ "type": self.method, "payload": self.payload }),
        )
    }
}

/// `eth_sendTransaction` parameters. Quantities are `0x` hex strings and
/// every field except `from` and `to` may be left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default, rename = "gas")]
    pub gas_limit: String,
    #[serde(default)]
    pub nonce: String,
}
