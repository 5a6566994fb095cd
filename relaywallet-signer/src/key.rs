use alloy_primitives::Address;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::hash::keccak256;
use crate::message::personal_message_hash;
use crate::SigningError;

/// Added to the recovery id in the last signature byte, as wallets expect.
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// secp256k1 key held by this wallet
pub struct WalletKey {
    signing_key: SigningKey,
}

/// `r || s || v` with `v` already offset by [`RECOVERY_ID_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthSignature([u8; 65]);

impl WalletKey {
    /// Parse a hex private key, with or without `0x`. Any decoding problem
    /// is reported; a key is never built from partial input.
    pub fn from_hex(s: &str) -> Result<Self, SigningError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SigningError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SigningError> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Checksummed `0x` address, the form used in approval payloads.
    pub fn address_hex(&self) -> String {
        self.address().to_checksum(None)
    }

    /// Sign a 32-byte digest as-is.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<EthSignature, SigningError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| SigningError::Crypto(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + RECOVERY_ID_OFFSET;
        Ok(EthSignature(out))
    }

    /// Sign `message` under the personal-message prefix.
    pub fn sign_message(&self, message: &[u8]) -> Result<EthSignature, SigningError> {
        self.sign_prehash(&personal_message_hash(message))
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("address", &self.address_hex())
            .finish_non_exhaustive()
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // skip the 0x04 SEC1 tag
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

impl EthSignature {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, SigningError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| SigningError::Crypto(e.to_string()))?;
        let bytes: [u8; 65] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SigningError::Crypto(format!("expected 65 bytes, got {}", b.len())))?;
        Ok(Self(bytes))
    }

    /// Recover the signer of `digest`.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<Address, SigningError> {
        let sig = Signature::from_slice(&self.0[..64])
            .map_err(|e| SigningError::Crypto(e.to_string()))?;
        let recid = self.0[64]
            .checked_sub(RECOVERY_ID_OFFSET)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| SigningError::Crypto(format!("bad recovery byte {}", self.0[64])))?;
        let key = VerifyingKey::recover_from_prehash(digest, &sig, recid)
            .map_err(|e| SigningError::Crypto(e.to_string()))?;
        Ok(address_of(&key))
    }
}
