use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Kind tag carried in the `type` field of every relay envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    /// `"sub"`: ask the relay to forward messages published on a topic
    Subscribe,
    /// `"pub"`: deliver a payload to every subscriber of a topic
    Publish,
    /// Anything else the relay sends (acks, pings, future kinds)
    Other(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::Subscribe => "sub",
            EnvelopeKind::Publish => "pub",
            EnvelopeKind::Other(s) => s,
        }
    }
}

impl From<String> for EnvelopeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sub" => EnvelopeKind::Subscribe,
            "pub" => EnvelopeKind::Publish,
            _ => EnvelopeKind::Other(s),
        }
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// The unit of exchange on a relay connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Relay topic. Some relays omit it on messages they deliver.
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("publish envelope on topic {topic:?} carries no payload")]
    MissingPayload { topic: String },
}

impl Envelope {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: EnvelopeKind::Subscribe,
            payload: None,
        }
    }

    pub fn publish(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            kind: EnvelopeKind::Publish,
            payload: Some(payload),
        }
    }

    pub fn is_publish(&self) -> bool {
        self.kind == EnvelopeKind::Publish
    }

    /// Whether this envelope was delivered for `topic`. An empty topic is
    /// treated as addressed to the connection's only subscription.
    pub fn is_for_topic(&self, topic: &str) -> bool {
        self.topic.is_empty() || self.topic == topic
    }

    /// Borrow the payload of a publish envelope, failing when it is absent.
    pub fn require_payload(&self) -> Result<&Value, EnvelopeError> {
        self.payload
            .as_ref()
            .ok_or_else(|| EnvelopeError::MissingPayload {
                topic: self.topic.clone(),
            })
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
