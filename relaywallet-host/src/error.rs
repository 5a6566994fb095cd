use crate::session::SessionState;
use crate::transport::TransportError;
use relaywallet_pairing::ConfigError;
use relaywallet_signer::{EncodingError, SigningError};
use thiserror::Error;

/// Failures that end or refuse a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The relay connection failed. Terminal for the session.
    #[error("connection error: {0}")]
    Connection(#[source] TransportError),
    /// An inbound message could not be understood. The session keeps its
    /// state and the caller may retry.
    #[error("parse error: {0}")]
    Parse(String),
    #[error("session closed")]
    Closed,
    #[error("{operation} is not valid while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// Failure of a single dispatched request. Never ends the session.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("bad request payload: {0}")]
    Parse(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}
