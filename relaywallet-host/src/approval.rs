use alloy_primitives::Address;
use log::info;
use relaywallet_pairing::PairingRequest;

use crate::error::SessionError;
use crate::session::WalletSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingDecision {
    /// Approve on this chain.
    Approve { chain_id: u64 },
    Reject { reason: String },
}

impl PairingDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, PairingDecision::Approve { .. })
    }
}

/// Decides whether a pairing request is accepted.
pub trait PairingApprover: Send + Sync {
    fn decide(&self, request: &PairingRequest) -> PairingDecision;
}

/// Approves every request, on the chain the application asked for unless
/// a chain is pinned.
#[derive(Debug, Default, Clone)]
pub struct AutoApprover {
    pub chain_override: Option<u64>,
}

impl PairingApprover for AutoApprover {
    fn decide(&self, request: &PairingRequest) -> PairingDecision {
        PairingDecision::Approve {
            chain_id: self.chain_override.unwrap_or(request.chain_id),
        }
    }
}

/// Rejects every request.
#[derive(Debug, Clone)]
pub struct RejectingApprover {
    pub reason: String,
}

impl PairingApprover for RejectingApprover {
    fn decide(&self, _request: &PairingRequest) -> PairingDecision {
        PairingDecision::Reject {
            reason: self.reason.clone(),
        }
    }
}

/// Wait for the pairing request, ask `approver`, and answer it. Requests
/// that fail to parse are logged and waited past.
pub async fn settle_pairing(
    session: &mut WalletSession,
    approver: &dyn PairingApprover,
    account: Address,
) -> Result<PairingDecision, SessionError> {
    let request = loop {
        match session.wait_for_pairing_request().await {
            Ok(request) => break request,
            Err(SessionError::Parse(e)) => info!("skipping unusable pairing request: {e}"),
            Err(e) => return Err(e),
        }
    };

    info!("{}", request.display_text());
    let decision = approver.decide(&request);
    match &decision {
        PairingDecision::Approve { chain_id } => session.approve(account, *chain_id).await?,
        PairingDecision::Reject { reason } => {
            info!("rejecting pairing from {:?}: {reason}", request.peer_meta.name);
            session.reject().await?;
        }
    }
    Ok(decision)
}
