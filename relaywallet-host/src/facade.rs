use crate::error::RequestError;
use crate::router::{HandlerResult, RequestRouter};
use alloy_primitives::Address;
use log::info;
use relaywallet_proto::{
    TransactionRequest, METHOD_ETH_SIGN, METHOD_PERSONAL_SIGN, METHOD_SEND_TRANSACTION,
    METHOD_SIGN_TYPED_DATA,
};
use relaywallet_signer::{
    decode_message_param, hash_typed_data, EthSignature, SigningError, TypedData, WalletKey,
};
use serde_json::Value;
use std::sync::Arc;

/// The operations a wallet performs for a paired application.
pub trait SigningFacade: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `message` under the personal-message prefix.
    fn sign_message(&self, message: &[u8]) -> Result<EthSignature, SigningError>;

    /// Sign a digest that was already computed, such as a typed-data hash.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<EthSignature, SigningError>;

    /// Returns the transaction hash.
    fn send_transaction(&self, request: &TransactionRequest) -> Result<String, SigningError>;
}

/// Hands a signed-off transaction to whatever broadcasts it.
pub trait TransactionSubmitter: Send + Sync {
    fn submit(&self, from: Address, request: &TransactionRequest) -> Result<String, SigningError>;
}

/// Facade over a key held in process memory.
pub struct LocalSigningFacade {
    key: WalletKey,
    submitter: Option<Arc<dyn TransactionSubmitter>>,
}

impl LocalSigningFacade {
    pub fn new(key: WalletKey) -> Self {
        Self {
            key,
            submitter: None,
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }
}

impl SigningFacade for LocalSigningFacade {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn sign_message(&self, message: &[u8]) -> Result<EthSignature, SigningError> {
        self.key.sign_message(message)
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<EthSignature, SigningError> {
        self.key.sign_prehash(digest)
    }

    fn send_transaction(&self, request: &TransactionRequest) -> Result<String, SigningError> {
        let wallet = self.key.address();
        let from: Address = request
            .from
            .parse()
            .map_err(|_| SigningError::InvalidRequest(format!("bad from address {:?}", request.from)))?;
        if from != wallet {
            return Err(SigningError::AddressMismatch {
                requested: request.from.clone(),
                wallet: wallet.to_checksum(None),
            });
        }

        let submitter = self.submitter.as_ref().ok_or_else(|| {
            SigningError::Unsupported("no transaction submitter configured".to_string())
        })?;
        submitter.submit(wallet, request)
    }
}

/// Register a handler for every request kind the facade serves. Results
/// are the signature (or transaction hash) as a `0x` hex string.
pub fn register_signing_handlers(router: &mut RequestRouter, facade: Arc<dyn SigningFacade>) {
    let f = facade.clone();
    router.register(METHOD_PERSONAL_SIGN, move |payload: &Value| -> HandlerResult {
        let message = message_param(payload, 0)?;
        let sig = f.sign_message(&decode_message_param(&message))?;
        info!("personal_sign: signed {} byte message", message.len());
        Ok(Value::String(sig.to_hex()))
    });

    let f = facade.clone();
    router.register(METHOD_ETH_SIGN, move |payload: &Value| -> HandlerResult {
        let message = message_param(payload, 1)?;
        let sig = f.sign_message(&decode_message_param(&message))?;
        info!("eth_sign: signed {} byte message", message.len());
        Ok(Value::String(sig.to_hex()))
    });

    let f = facade.clone();
    router.register(METHOD_SIGN_TYPED_DATA, move |payload: &Value| -> HandlerResult {
        let typed = typed_data_param(payload)?;
        let digest = hash_typed_data(&typed)?;
        let sig = f.sign_digest(&digest)?;
        info!("eth_signTypedData: signed {}", typed.primary_type);
        Ok(Value::String(sig.to_hex()))
    });

    let f = facade;
    router.register(METHOD_SEND_TRANSACTION, move |payload: &Value| -> HandlerResult {
        let request = transaction_param(payload)?;
        let hash = f.send_transaction(&request)?;
        info!("eth_sendTransaction: submitted {hash}");
        Ok(Value::String(hash))
    });
}

/// Message text from a signing payload. Accepts a bare string, a
/// `{"message"|"data": ..}` object, or a JSON-RPC style params array where
/// the message sits at `position`.
fn message_param(payload: &Value, position: usize) -> Result<String, RequestError> {
    let found = match payload {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("data"))
            .and_then(Value::as_str),
        Value::Array(items) => items.get(position).and_then(Value::as_str),
        _ => None,
    };
    found
        .map(str::to_string)
        .ok_or_else(|| RequestError::Parse(format!("no message in {payload}")))
}

/// Typed data from a payload: the object itself, a JSON string of it, or
/// the last element of a params array in either form.
fn typed_data_param(payload: &Value) -> Result<TypedData, RequestError> {
    let parse_err = |e: serde_json::Error| RequestError::Parse(format!("typed data: {e}"));
    match payload {
        Value::Object(_) => serde_json::from_value(payload.clone()).map_err(parse_err),
        Value::String(s) => TypedData::from_json(s).map_err(parse_err),
        Value::Array(items) => match items.last() {
            Some(last) if !last.is_array() => typed_data_param(last),
            _ => Err(RequestError::Parse("typed data: empty params".to_string())),
        },
        _ => Err(RequestError::Parse(format!("typed data: unexpected {payload}"))),
    }
}

fn transaction_param(payload: &Value) -> Result<TransactionRequest, RequestError> {
    let tx = match payload {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };
    serde_json::from_value(tx.clone()).map_err(|e| RequestError::Parse(format!("transaction: {e}")))
}
