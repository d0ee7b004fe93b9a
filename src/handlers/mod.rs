pub mod circles;
pub mod public;
pub mod trading;

use axum::Json;
use std::time::Instant;

use crate::error::{api_err, ApiResult, AppResult};
use crate::metrics;

/// Records metrics for `op` and maps the outcome to a JSON response.
fn finish<T>(op: &'static str, t0: Instant, res: AppResult<T>) -> ApiResult<T> {
    metrics::observe(op, t0, &res);
    match res {
        Ok(v) => Ok(Json(v)),
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::warn!(op, error = %e, "request failed");
            }
            api_err(e)
        }
    }
}
