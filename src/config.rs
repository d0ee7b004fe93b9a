//! Environment-driven configuration for `circle-engine`.
//!
//! - node RPC endpoint (+ optional expected chain id)
//! - factory and bonding-curve contract addresses
//! - HTTP bind + admin token
//! - submission knobs (RPC timeout, gas buffer, per-sender serialization)

use alloy::primitives::Address;
use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::transactor::GAS_LIMIT_BUFFER;

const MIN_RPC_TIMEOUT_MS: u64 = 1_000;
const MAX_RPC_TIMEOUT_MS: u64 = 120_000;

#[derive(Clone)]
pub struct Config {
    /// Gates `/metrics`. Send via `Authorization: Bearer <token>` or `x-admin-token`.
    pub admin_token: String,
    pub rpc_url: Url,
    /// When set, startup fails unless the node reports the same id.
    pub chain_id: Option<u64>,
    pub factory_address: Address,
    pub bonding_curve_address: Address,
    /// Axum bind address, host:port.
    pub api_bind: String,
    pub rpc_timeout: Duration,
    pub gas_limit_buffer: u64,
    /// Hold a per-sender lock from nonce fetch through broadcast.
    pub serialize_submissions: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("chain_id", &self.chain_id)
            .field("factory_address", &self.factory_address)
            .field("bonding_curve_address", &self.bonding_curve_address)
            .field("api_bind", &self.api_bind)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("gas_limit_buffer", &self.gas_limit_buffer)
            .field("serialize_submissions", &self.serialize_submissions)
            .finish_non_exhaustive()
    }
}

fn env_required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("Missing env var: {key}"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let s = v.trim().to_lowercase();
            matches!(s.as_str(), "1" | "true" | "yes" | "y" | "on")
        })
        .unwrap_or(default)
}

fn validate_rpc_url(raw: &str) -> anyhow::Result<Url> {
    let u = Url::parse(raw).with_context(|| format!("Invalid RPC_URL: {raw}"))?;
    match u.scheme() {
        "https" => {}
        "http" => tracing::warn!("RPC_URL uses plain http; fine for a local node only"),
        other => anyhow::bail!("RPC_URL must be http(s), got {other}://"),
    }
    if u.host_str().is_none() {
        anyhow::bail!("RPC_URL has no host: {raw}");
    }
    Ok(u)
}

fn parse_contract(key: &str) -> anyhow::Result<Address> {
    let raw = env_required(key)?;
    let addr = Address::from_str(&raw).with_context(|| format!("Invalid {key}: {raw}"))?;
    if addr == Address::ZERO {
        anyhow::bail!("{key} must not be the zero address");
    }
    Ok(addr)
}

pub fn load_config() -> anyhow::Result<Config> {
    let admin_token = env_required("ADMIN_TOKEN")?;
    if admin_token.len() < 32 {
        anyhow::bail!("ADMIN_TOKEN must be at least 32 characters");
    }

    let rpc_url = validate_rpc_url(&env_required("RPC_URL")?)?;
    let chain_id = match env::var("CHAIN_ID").ok().filter(|v| !v.trim().is_empty()) {
        Some(v) => Some(
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid CHAIN_ID: {v}"))?,
        ),
        None => None,
    };
    let factory_address = parse_contract("FACTORY_ADDRESS")?;
    let bonding_curve_address = parse_contract("BONDING_CURVE_ADDRESS")?;

    let api_bind = env::var("API_BIND")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let mut rpc_timeout_ms = env_u64("RPC_TIMEOUT_MS", 15_000);
    if !(MIN_RPC_TIMEOUT_MS..=MAX_RPC_TIMEOUT_MS).contains(&rpc_timeout_ms) {
        let clamped = rpc_timeout_ms.clamp(MIN_RPC_TIMEOUT_MS, MAX_RPC_TIMEOUT_MS);
        tracing::warn!(
            "RPC_TIMEOUT_MS={} out of range; using {}",
            rpc_timeout_ms,
            clamped
        );
        rpc_timeout_ms = clamped;
    }

    let gas_limit_buffer = env_u64("GAS_LIMIT_BUFFER", GAS_LIMIT_BUFFER);
    let serialize_submissions = env_bool("SERIALIZE_SUBMISSIONS", true);
    if !serialize_submissions {
        tracing::warn!(
            "SERIALIZE_SUBMISSIONS=false: concurrent requests signed by one key may collide on nonce"
        );
    }

    Ok(Config {
        admin_token,
        rpc_url,
        chain_id,
        factory_address,
        bonding_curve_address,
        api_bind,
        rpc_timeout: Duration::from_millis(rpc_timeout_ms),
        gas_limit_buffer,
        serialize_submissions,
    })
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        admin_token: "a".repeat(32),
        rpc_url: Url::parse("http://127.0.0.1:8545").unwrap(),
        chain_id: Some(11_155_111),
        factory_address: Address::repeat_byte(0xf0),
        bonding_curve_address: Address::repeat_byte(0xc0),
        api_bind: "127.0.0.1:0".into(),
        rpc_timeout: Duration::from_millis(MIN_RPC_TIMEOUT_MS),
        gas_limit_buffer: GAS_LIMIT_BUFFER,
        serialize_submissions: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_must_be_http() {
        assert!(validate_rpc_url("https://sepolia.example.org/v3/key").is_ok());
        assert!(validate_rpc_url("http://127.0.0.1:8545").is_ok());
        assert!(validate_rpc_url("ws://127.0.0.1:8546").is_err());
        assert!(validate_rpc_url("not a url").is_err());
    }

    #[test]
    fn debug_output_hides_admin_token() {
        let cfg = test_config();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains(&cfg.admin_token));
        assert!(shown.contains("rpc_url"));
    }
}
