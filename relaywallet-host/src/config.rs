use anyhow::{anyhow, Context};
use relaywallet_pairing::{WalletMeta, DEFAULT_BRIDGE};
use relaywallet_signer::WalletKey;

use crate::approval::{AutoApprover, PairingApprover, RejectingApprover};

pub const ENV_URI: &str = "RELAYWALLET_URI";
pub const ENV_PRIVATE_KEY: &str = "RELAYWALLET_PRIVATE_KEY";
pub const ENV_DEFAULT_BRIDGE: &str = "RELAYWALLET_DEFAULT_BRIDGE";
pub const ENV_CHAIN_ID: &str = "RELAYWALLET_CHAIN_ID";
pub const ENV_AUTO_APPROVE: &str = "RELAYWALLET_AUTO_APPROVE";
pub const ENV_WALLET_NAME: &str = "RELAYWALLET_WALLET_NAME";

/// Everything the agent needs to start a session.
#[derive(Clone)]
pub struct HostConfig {
    pub uri: String,
    pub private_key: String,
    pub default_bridge: String,
    /// Chain to approve on; the peer's chain when unset.
    pub chain_id: Option<u64>,
    pub auto_approve: bool,
    pub wallet_meta: WalletMeta,
}

impl HostConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let uri = set(ENV_URI).ok_or_else(|| anyhow!("{ENV_URI} is not set"))?;
        let private_key =
            set(ENV_PRIVATE_KEY).ok_or_else(|| anyhow!("{ENV_PRIVATE_KEY} is not set"))?;
        let chain_id = set(ENV_CHAIN_ID)
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .with_context(|| format!("parsing {ENV_CHAIN_ID}"))?;
        let auto_approve = set(ENV_AUTO_APPROVE)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let wallet_meta = match set(ENV_WALLET_NAME) {
            Some(name) => WalletMeta::named(name),
            None => WalletMeta::default(),
        };

        Ok(Self {
            uri: uri.trim().to_string(),
            private_key,
            default_bridge: set(ENV_DEFAULT_BRIDGE).unwrap_or_else(|| DEFAULT_BRIDGE.to_string()),
            chain_id,
            auto_approve,
            wallet_meta,
        })
    }

    pub fn wallet_key(&self) -> anyhow::Result<WalletKey> {
        WalletKey::from_hex(&self.private_key).with_context(|| format!("parsing {ENV_PRIVATE_KEY}"))
    }

    /// The pairing gate this configuration asks for.
    pub fn approver(&self) -> Box<dyn PairingApprover> {
        if self.auto_approve {
            Box::new(AutoApprover {
                chain_override: self.chain_id,
            })
        } else {
            Box::new(RejectingApprover {
                reason: format!("{ENV_AUTO_APPROVE} is not enabled"),
            })
        }
    }
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("uri", &self.uri)
            .field("default_bridge", &self.default_bridge)
            .field("chain_id", &self.chain_id)
            .field("auto_approve", &self.auto_approve)
            .field("wallet_meta", &self.wallet_meta)
            .finish_non_exhaustive()
    }
}
