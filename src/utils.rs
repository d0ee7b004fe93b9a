use alloy::primitives::{Address, U256};
use axum::http::{header, HeaderMap};

use crate::error::AppError;

pub fn now_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Base-10 unsigned integer; rejects signs, hex and anything over 2^256-1.
pub fn parse_decimal(field: &str, s: &str) -> Result<U256, AppError> {
    let t = s.trim();
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!(
            "{field} must be a base-10 integer"
        )));
    }
    U256::from_str_radix(t, 10)
        .map_err(|_| AppError::BadRequest(format!("{field} is out of range")))
}

pub fn parse_address(field: &str, s: &str) -> Result<Address, AppError> {
    s.trim()
        .parse::<Address>()
        .map_err(|_| AppError::BadRequest(format!("{field} must be a 20-byte hex address")))
}

pub fn header_admin_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.contains('\r') && !s.contains('\n'))
        .filter(|s| !s.is_empty())
}

pub fn header_bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if v.contains('\r') || v.contains('\n') {
        return None;
    }
    v.strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parsing_is_strict() {
        assert_eq!(parse_decimal("amount", "100").unwrap(), U256::from(100));
        assert_eq!(
            parse_decimal("amount", " 1000000000000000000 ").unwrap(),
            U256::from(10u64.pow(18))
        );
        for bad in ["", "-1", "0x10", "1.5", "1e18", "abc"] {
            assert!(parse_decimal("amount", bad).is_err(), "{bad:?}");
        }
        let too_big = "1".repeat(80);
        assert!(parse_decimal("amount", &too_big).is_err());
    }

    #[test]
    fn addresses_parse_with_or_without_checksum() {
        assert!(parse_address("a", "0x7070707070707070707070707070707070707070").is_ok());
        assert!(parse_address("a", "0x1234").is_err());
    }

    #[test]
    fn bearer_token_requires_prefix() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(header_bearer_token(&h).as_deref(), Some("abc"));
        h.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(header_bearer_token(&h), None);
    }
}
