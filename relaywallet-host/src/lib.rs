mod approval;
mod config;
mod error;
mod facade;
mod router;
mod session;
mod transport;

pub use approval::{
    settle_pairing, AutoApprover, PairingApprover, PairingDecision, RejectingApprover,
};
pub use config::HostConfig;
pub use error::{RequestError, SessionError};
pub use facade::{
    register_signing_handlers, LocalSigningFacade, SigningFacade, TransactionSubmitter,
};
pub use router::{Dispatch, HandlerResult, RequestHandler, RequestRouter};
pub use session::{DispatchStats, SessionCloser, SessionState, WalletSession};
pub use transport::{
    Connector, EnvelopeChannel, FakeConnector, FakeRelay, TransportError, WebSocketChannel,
    WebSocketConnector,
};
