use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::rpc::RpcError;
use crate::store::StoreError;

/// Whether (and how) a caller may retry after seeing an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// Resubmitting the same request fails the same way.
    Never,
    /// Nothing reached the chain; a fresh attempt is safe.
    FreshAttempt,
    /// The chain may already hold the transaction. Reconcile by hash before retrying.
    OutOfBand,
}

/// Stage of transaction preparation that failed. Nothing is broadcast on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepStep {
    DeriveSender,
    Nonce,
    GasPrice,
    EstimateGas,
    Sign,
}

impl fmt::Display for PrepStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrepStep::DeriveSender => "derive_sender",
            PrepStep::Nonce => "nonce",
            PrepStep::GasPrice => "gas_price",
            PrepStep::EstimateGas => "estimate_gas",
            PrepStep::Sign => "sign",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("submission preparation failed at {step}: {cause}")]
    Prepare { step: PrepStep, cause: String },
    /// The node rejected or dropped `eth_sendRawTransaction`; the tx may still propagate.
    #[error("broadcast of {tx_hash} failed: {cause}")]
    Broadcast { tx_hash: String, cause: String },
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("storage error: {0}")]
    Storage(String),
    /// The chain accepted `tx_hash` but the local projection could not record it.
    #[error("unreconciled submission {tx_hash}: {cause}")]
    Unreconciled { tx_hash: String, cause: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Precondition(_) => StatusCode::CONFLICT,
            AppError::Prepare {
                step: PrepStep::DeriveSender,
                ..
            } => StatusCode::BAD_REQUEST,
            AppError::Prepare { .. } => StatusCode::BAD_GATEWAY,
            AppError::Broadcast { .. } => StatusCode::BAD_GATEWAY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unreconciled { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Coarse category for clients and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Precondition(_) => "precondition",
            AppError::Prepare {
                step: PrepStep::DeriveSender,
                ..
            } => "credential",
            AppError::Prepare { .. } | AppError::Broadcast { .. } | AppError::BadGateway(_) => {
                "chain_rpc"
            }
            AppError::Storage(_) | AppError::Unreconciled { .. } => "persistence",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn retry(&self) -> RetryClass {
        match self {
            AppError::BadRequest(_)
            | AppError::Forbidden(_)
            | AppError::NotFound(_)
            | AppError::Precondition(_)
            | AppError::Internal(_) => RetryClass::Never,
            AppError::Prepare {
                step: PrepStep::DeriveSender,
                ..
            } => RetryClass::Never,
            AppError::Prepare { .. } | AppError::BadGateway(_) | AppError::Storage(_) => {
                RetryClass::FreshAttempt
            }
            // A failed send may still have reached the mempool.
            AppError::Broadcast { .. } | AppError::Unreconciled { .. } => RetryClass::OutOfBand,
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            AppError::Broadcast { tx_hash, .. } | AppError::Unreconciled { tx_hash, .. } => {
                Some(tx_hash.as_str())
            }
            _ => None,
        }
    }

    pub fn prepare(step: PrepStep, cause: impl fmt::Display) -> Self {
        AppError::Prepare {
            step,
            cause: cause.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            retry: self.retry(),
            tx_hash: self.tx_hash().map(str::to_string),
        }
    }
}

impl From<RpcError> for AppError {
    fn from(e: RpcError) -> Self {
        AppError::BadGateway(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::DuplicateHash(h) => {
                AppError::Precondition(format!("transaction {h} already recorded"))
            }
            StoreError::Backend(m) => AppError::Storage(m),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub retry: RetryClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

pub type AppResult<T> = Result<T, AppError>;

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

pub fn api_err<T>(e: AppError) -> ApiResult<T> {
    Err((e.status_code(), Json(e.body())))
}
