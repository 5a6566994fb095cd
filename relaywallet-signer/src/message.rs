use crate::hash::keccak256_concat;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Digest signed by `personal_sign` and `eth_sign`: the message prefixed
/// with the scheme's banner and its decimal byte length.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let len = message.len().to_string();
    keccak256_concat(&[PERSONAL_MESSAGE_PREFIX.as_bytes(), len.as_bytes(), message])
}

/// Interpret a message parameter as sent by applications: `0x`-prefixed
/// hex is decoded, anything else (including bad hex) is taken as UTF-8.
pub fn decode_message_param(message: &str) -> Vec<u8> {
    match message.strip_prefix("0x") {
        Some(stripped) => {
            hex::decode(stripped).unwrap_or_else(|_| message.as_bytes().to_vec())
        }
        None => message.as_bytes().to_vec(),
    }
}
