use serde::{Deserialize, Serialize};

/// Self-description of the application on the other end of a session.
/// Shown to the key holder when deciding; never trusted otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
    #[serde(default)]
    pub name: String,
}

/// Session request published by the application on the handshake topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequest {
    pub peer_id: String,
    #[serde(default)]
    pub peer_meta: PeerMeta,
    pub chain_id: u64,
}

impl PairingRequest {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Multi-line summary suitable for an approval prompt.
    pub fn display_text(&self) -> String {
        format!(
            "Connection request from dApp:\nName: {}\nURL: {}\nDescription: {}\nChain: {}",
            self.peer_meta.name, self.peer_meta.url, self.peer_meta.description, self.chain_id
        )
    }
}

/// How this wallet introduces itself in the approval payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMeta {
    pub name: String,
    pub description: String,
    pub icons: Vec<String>,
}

impl Default for WalletMeta {
    fn default() -> Self {
        Self {
            name: "relaywallet".to_string(),
            description: "Console wallet with a locally held key".to_string(),
            icons: vec![],
        }
    }
}

impl WalletMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Answer published on the handshake topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPayload {
    pub approved: bool,
    pub chain_id: u64,
    pub accounts: Vec<String>,
    pub peer_id: String,
    pub peer_meta: WalletMeta,
}

impl ApprovalPayload {
    pub fn approved(
        account: impl Into<String>,
        chain_id: u64,
        peer_id: impl Into<String>,
        peer_meta: WalletMeta,
    ) -> Self {
        Self {
            approved: true,
            chain_id,
            accounts: vec![account.into()],
            peer_id: peer_id.into(),
            peer_meta,
        }
    }

    pub fn rejected(peer_id: impl Into<String>, peer_meta: WalletMeta) -> Self {
        Self {
            approved: false,
            chain_id: 0,
            accounts: vec![],
            peer_id: peer_id.into(),
            peer_meta,
        }
    }
}
