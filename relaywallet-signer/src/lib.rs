mod error;
mod hash;
mod key;
mod message;
pub mod typed_data;

pub use error::{EncodingError, SigningError};
pub use hash::keccak256;
pub use key::{EthSignature, WalletKey, RECOVERY_ID_OFFSET};
pub use message::{decode_message_param, personal_message_hash};
pub use typed_data::{
    encode_domain, encode_message_values, encode_type_signature, hash_typed_data, TypeField,
    TypeSet, TypedData, TypedDataDomain,
};
