//! Circle engine
//!
//! Creates tokenized circles through an on-chain factory, trades them against a bonding
//! curve, and keeps a searchable local index of circles and submitted transactions.
//!
//! API shape:
//! - `GET  /health`
//! - `POST /circles` -> validate curve, submit `createCircle`, index as `pending`
//! - `GET  /circles`, `/circles/search?q=`, `/circles/trending`, `/circles/:id`, `/circles/:id/transactions`
//! - `POST /trading/buy`, `/trading/sell` -> submit trade, best-effort ledger row
//! - `GET  /trading/balance/:circle_id/:address`, `/trading/price/:circle_id`, `/trading/quote/:circle_id`
//! - `GET  /transactions/:hash`
//! - admin: `/metrics`, `PUT /circles/:id/link`, `PUT /circles/:id/sync`, `POST /circles/:id/stats`
//!
//! Writes return as soon as the node accepts the raw transaction. Confirmation is observed
//! later through `link` + `sync`.

mod auth;
mod circles;
mod config;
mod contracts;
mod curve;
mod error;
mod handlers;
mod metrics;
mod models;
mod query;
mod router;
mod rpc;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod trading;
mod transactor;
mod types;
mod utils;

use std::sync::Arc;
use tracing::info;

use crate::contracts::ContractGateway;
use crate::rpc::{ChainRpc, NodeClient};
use crate::store::MemoryStore;
use crate::transactor::{ChainTransactor, SubmissionLocks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,circle_engine=debug".into()),
        )
        .init();

    let cfg = config::load_config()?;
    info!(
        "starting circle-engine (bind={}, factory={}, bonding_curve={})",
        cfg.api_bind, cfg.factory_address, cfg.bonding_curve_address
    );

    let rpc: Arc<dyn ChainRpc> = Arc::new(NodeClient::new(cfg.rpc_url.clone(), cfg.rpc_timeout));
    let node_chain_id = rpc
        .chain_id()
        .await
        .map_err(|e| anyhow::anyhow!("fetch chain id failed: {e}"))?;
    if let Some(expected) = cfg.chain_id {
        if expected != node_chain_id {
            anyhow::bail!("CHAIN_ID={expected} but node reports {node_chain_id}");
        }
    }
    info!(
        "connected to chain {} (rpc_timeout={:?}, gas_buffer={}, serialize_submissions={})",
        node_chain_id, cfg.rpc_timeout, cfg.gas_limit_buffer, cfg.serialize_submissions
    );

    let transactor =
        ChainTransactor::new(rpc.clone(), node_chain_id).with_gas_buffer(cfg.gas_limit_buffer);
    let gateway = Arc::new(ContractGateway::new(
        rpc,
        transactor,
        SubmissionLocks::new(cfg.serialize_submissions),
        cfg.factory_address,
        cfg.bonding_curve_address,
    ));

    // Both ports are served by one process-local adapter.
    let store = Arc::new(MemoryStore::new());
    let lifecycle = Arc::new(circles::CircleLifecycleManager::new(
        gateway.clone(),
        store.clone(),
        store.clone(),
    ));
    let trading = Arc::new(trading::TradingEngine::new(
        lifecycle.clone(),
        gateway,
        store.clone(),
    ));

    let state = state::AppState {
        cfg: Arc::new(cfg),
        circles: store.clone(),
        ledger: store,
        lifecycle,
        trading,
    };
    let bind = state.cfg.api_bind.clone();
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
    info!("api listening on http://{}", bind);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
