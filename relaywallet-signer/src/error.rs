use thiserror::Error;

/// Reasons a structured message cannot be turned into a digest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("missing value for field: {0}")]
    MissingField(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("invalid {expected} value for field: {field}")]
    TypeMismatch { field: String, expected: String },
}

impl EncodingError {
    pub(crate) fn mismatch(field: &str, expected: &str) -> Self {
        EncodingError::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("failed to sign: {0}")]
    Crypto(String),

    #[error("invalid signing request: {0}")]
    InvalidRequest(String),

    #[error("from address mismatch: request has {requested}, wallet is {wallet}")]
    AddressMismatch { requested: String, wallet: String },

    #[error("unsupported request: {0}")]
    Unsupported(String),
}
