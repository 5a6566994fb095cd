use std::collections::BTreeMap;
use thiserror::Error;
use url::form_urlencoded;

/// Relay used when the pairing identifier does not name one.
pub const DEFAULT_BRIDGE: &str = "wss://bridge.walletconnect.org";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URI format: {0}")]
    InvalidUriFormat(&'static str),
}

/// Connection parameters decoded from a pairing identifier of the form
/// `prefix:topic@version?key=value&...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingParameters {
    pub bridge: String,
    pub handshake_topic: String,
    pub version: String,
    /// Every query parameter, including the ones interpreted above.
    pub query: BTreeMap<String, String>,
}

impl PairingParameters {
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        Self::parse_with_default(uri, DEFAULT_BRIDGE)
    }

    /// Parse `uri`, falling back to `default_bridge` when the `bridge`
    /// query parameter is missing or empty.
    pub fn parse_with_default(uri: &str, default_bridge: &str) -> Result<Self, ConfigError> {
        let (base, query_str) = uri
            .split_once('?')
            .ok_or(ConfigError::InvalidUriFormat("missing query parameters"))?;

        // The query may itself contain ':' (bridge URLs), so the prefix is
        // only stripped from the part before '?'.
        let base = match base.split_once(':') {
            Some((_prefix, rest)) => rest,
            None => base,
        };

        let (topic, version) = base
            .split_once('@')
            .ok_or(ConfigError::InvalidUriFormat("missing version"))?;
        if version.contains('@') {
            return Err(ConfigError::InvalidUriFormat("unexpected '@' in version"));
        }
        if topic.is_empty() {
            return Err(ConfigError::InvalidUriFormat("empty topic"));
        }

        let query = parse_query(query_str);
        let bridge = match query.get("bridge") {
            Some(b) if !b.is_empty() => b.clone(),
            _ => default_bridge.to_string(),
        };

        Ok(Self {
            bridge,
            handshake_topic: topic.to_string(),
            version: version.to_string(),
            query,
        })
    }

    /// Symmetric key material, when the identifier carries one.
    pub fn key(&self) -> Option<&str> {
        self.query
            .get("key")
            .or_else(|| self.query.get("symKey"))
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }
}

/// Percent-decoded query parameters. The first occurrence of a repeated
/// key wins.
fn parse_query(query: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    params
}
