use crate::error::{ApiResult, AppError};
use crate::models::LedgerEntry;
use crate::state::AppState;
use axum::extract::{Path, State};
use std::time::Instant;

pub async fn health() -> &'static str {
    "ok"
}

/// Ledger lookup by transaction hash, for reconciling `out_of_band` failures.
pub async fn transaction(
    State(st): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<LedgerEntry> {
    let t0 = Instant::now();
    let res = match st.ledger.get_by_hash(&hash).await {
        Ok(Some(e)) => Ok(e),
        Ok(None) => Err(AppError::NotFound(format!("transaction {hash}"))),
        Err(e) => Err(e.into()),
    };
    super::finish("transaction", t0, res)
}
