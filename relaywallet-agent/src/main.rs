use std::sync::Arc;

use anyhow::Context;
use relaywallet_host::{
    register_signing_handlers, settle_pairing, HostConfig, LocalSigningFacade, PairingDecision,
    RequestRouter, WalletSession, WebSocketConnector,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = HostConfig::from_env()?;
    let key = config.wallet_key()?;
    let account = key.address();

    let mut session =
        WalletSession::from_uri(&config.uri, &config.default_bridge, config.wallet_meta.clone())
            .context("parsing pairing URI")?;

    log::info!(
        "relaywallet-agent starting (account={}, client={}, bridge={}, topic={})",
        key.address_hex(),
        session.client_id(),
        session.params().bridge,
        session.params().handshake_topic
    );

    session
        .open(&WebSocketConnector)
        .await
        .context("opening relay session")?;

    let closer = session.closer();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted; closing session");
            closer.close();
        }
    });

    let approver = config.approver();
    match settle_pairing(&mut session, approver.as_ref(), account)
        .await
        .context("pairing")?
    {
        PairingDecision::Approve { chain_id } => {
            log::info!("paired on chain {chain_id}");
        }
        PairingDecision::Reject { reason } => {
            log::warn!("pairing rejected: {reason}");
            return Ok(());
        }
    }

    let mut router = RequestRouter::new();
    register_signing_handlers(&mut router, Arc::new(LocalSigningFacade::new(key)));

    let stats = session.run(&router).await.context("relay session")?;
    log::info!("session closed ({stats})");
    Ok(())
}
