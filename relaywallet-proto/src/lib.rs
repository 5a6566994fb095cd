pub mod protocol;
pub mod relay;

pub use protocol::{
    RequestPayload, TransactionRequest, METHOD_ETH_SIGN, METHOD_PERSONAL_SIGN,
    METHOD_SEND_TRANSACTION, METHOD_SIGN_TYPED_DATA,
};
pub use relay::{Envelope, EnvelopeError, EnvelopeKind};
