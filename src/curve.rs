//! Bonding-curve configuration checks.
//!
//! A circle's curve is fixed at creation and cannot be corrected on-chain afterwards,
//! so parameters are checked here before anything is signed.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CurveType {
    Linear = 0,
    Exponential = 1,
    Sigmoid = 2,
}

impl CurveType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CurveType::Linear),
            1 => Some(CurveType::Exponential),
            2 => Some(CurveType::Sigmoid),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Validated curve parameters. Every field is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveParameters {
    Linear { k: U256 },
    Exponential { k: U256 },
    Sigmoid { k: U256, m: U256, n: U256 },
}

impl CurveParameters {
    pub fn curve_type(&self) -> CurveType {
        match self {
            CurveParameters::Linear { .. } => CurveType::Linear,
            CurveParameters::Exponential { .. } => CurveType::Exponential,
            CurveParameters::Sigmoid { .. } => CurveType::Sigmoid,
        }
    }

    /// `(k, m, n)` in `createCircle` argument order; slots the curve does not use are zero.
    pub fn call_args(&self) -> (U256, U256, U256) {
        match *self {
            CurveParameters::Linear { k } | CurveParameters::Exponential { k } => {
                (k, U256::ZERO, U256::ZERO)
            }
            CurveParameters::Sigmoid { k, m, n } => (k, m, n),
        }
    }
}

fn positive(v: Option<U256>) -> Option<U256> {
    v.filter(|x| !x.is_zero())
}

/// Checks a curve-type tag and its optional parameters.
///
/// Parameters a curve does not use are ignored.
pub fn validate_curve_params(
    tag: u8,
    k: Option<U256>,
    m: Option<U256>,
    n: Option<U256>,
) -> Result<CurveParameters, AppError> {
    let curve = CurveType::from_tag(tag)
        .ok_or_else(|| AppError::BadRequest(format!("unsupported curve type: {tag}")))?;
    match curve {
        CurveType::Linear => positive(k)
            .map(|k| CurveParameters::Linear { k })
            .ok_or_else(|| AppError::BadRequest("linear curve requires k > 0".into())),
        CurveType::Exponential => positive(k)
            .map(|k| CurveParameters::Exponential { k })
            .ok_or_else(|| AppError::BadRequest("exponential curve requires k > 0".into())),
        CurveType::Sigmoid => {
            let (Some(k), Some(m), Some(n)) = (k, m, n) else {
                return Err(AppError::BadRequest(
                    "sigmoid curve requires k, m, and n parameters".into(),
                ));
            };
            if k.is_zero() || m.is_zero() || n.is_zero() {
                return Err(AppError::BadRequest(
                    "sigmoid curve parameters must be > 0".into(),
                ));
            }
            Ok(CurveParameters::Sigmoid { k, m, n })
        }
    }
}
