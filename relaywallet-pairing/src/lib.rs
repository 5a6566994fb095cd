mod pairing;
mod uri;

pub use pairing::{ApprovalPayload, PairingRequest, PeerMeta, WalletMeta};
pub use uri::{ConfigError, PairingParameters, DEFAULT_BRIDGE};
