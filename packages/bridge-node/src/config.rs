//! Node configuration
//!
//! Loaded from the environment (and a `.env` file if present). Required:
//!
//! - `BRIDGE_THIS_CHAIN_ID`, `BRIDGE_COUNTERPART_CHAIN_ID` - decimal or `0x` hex
//! - `BRIDGE_SIGNERS` - comma-separated Ed25519 public keys (hex)
//!
//! Everything else has a default.

use bridge_core::{BridgeSettings, ChainId, SignerId};
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Instance name reported by `/health`
    pub node_id: String,

    pub bridge: BridgeSettings,
    /// Genesis signer set
    pub signers: Vec<SignerId>,

    pub api_bind_address: String,
    pub api_port: u16,

    /// Interval for the finalized-event feed, in milliseconds
    pub event_poll_interval_ms: u64,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let default_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("bridge-node-{}", std::process::id()));

        let this_chain = parse_chain_id(
            get("BRIDGE_THIS_CHAIN_ID").ok_or_else(|| eyre!("BRIDGE_THIS_CHAIN_ID required"))?,
        )
        .wrap_err("Invalid BRIDGE_THIS_CHAIN_ID")?;
        let counterpart_chain = parse_chain_id(
            get("BRIDGE_COUNTERPART_CHAIN_ID")
                .ok_or_else(|| eyre!("BRIDGE_COUNTERPART_CHAIN_ID required"))?,
        )
        .wrap_err("Invalid BRIDGE_COUNTERPART_CHAIN_ID")?;

        let signers = get("BRIDGE_SIGNERS")
            .ok_or_else(|| eyre!("BRIDGE_SIGNERS required"))?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<SignerId>()
                    .map_err(|e| eyre!("Invalid signer key {}: {}", s, e))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut bridge = BridgeSettings::new(this_chain, counterpart_chain);
        if let Some(v) = get("LOCK_PERIOD_SECS") {
            bridge.lock_period_secs = v.parse().wrap_err("Invalid LOCK_PERIOD_SECS")?;
        }
        if let Some(v) = get("UNLOCK_PERIOD_SECS") {
            bridge.unlock_period_secs = v.parse().wrap_err("Invalid UNLOCK_PERIOD_SECS")?;
        }
        if let Some(v) = get("INTENT_TTL_SECS") {
            bridge.intent_ttl_secs = v.parse().wrap_err("Invalid INTENT_TTL_SECS")?;
        }
        if let Some(v) = get("MIN_AMOUNT") {
            bridge.min_amount = v.parse().wrap_err("Invalid MIN_AMOUNT")?;
        }
        if let Some(v) = get("MAX_AMOUNT") {
            bridge.max_amount = v.parse().wrap_err("Invalid MAX_AMOUNT")?;
        }
        if let Some(v) = get("BRIDGE_THRESHOLD") {
            bridge.threshold = Some(v.parse().wrap_err("Invalid BRIDGE_THRESHOLD")?);
        }

        let config = Self {
            node_id: get("NODE_ID").map(str::to_string).unwrap_or(default_id),
            bridge,
            signers,
            api_bind_address: get("API_BIND_ADDRESS").unwrap_or("127.0.0.1").to_string(),
            api_port: match get("API_PORT") {
                Some(v) => v.parse().wrap_err("Invalid API_PORT")?,
                None => 9100,
            },
            event_poll_interval_ms: match get("EVENT_POLL_INTERVAL_MS") {
                Some(v) => v.parse().wrap_err("Invalid EVENT_POLL_INTERVAL_MS")?,
                None => 1000,
            },
            log_json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bridge
            .validate()
            .map_err(|e| eyre!("Invalid bridge settings: {}", e))?;
        if self.signers.is_empty() {
            return Err(eyre!("BRIDGE_SIGNERS must list at least one key"));
        }
        if let Some(threshold) = self.bridge.threshold {
            if threshold == 0 || threshold as usize > self.signers.len() {
                return Err(eyre!(
                    "BRIDGE_THRESHOLD {} must be between 1 and {}",
                    threshold,
                    self.signers.len()
                ));
            }
        }
        if self.event_poll_interval_ms == 0 {
            return Err(eyre!("EVENT_POLL_INTERVAL_MS must be greater than zero"));
        }
        Ok(())
    }
}

/// Parse a chain ID given as decimal (`"7"`) or 4-byte hex (`"0x00000007"`).
pub fn parse_chain_id(s: &str) -> Result<ChainId> {
    let s = s.trim();
    if s.starts_with("0x") {
        return ChainId::from_hex(s).map_err(|e| eyre!("{}", e));
    }
    s.parse::<u32>()
        .map(ChainId::from_u32)
        .map_err(|e| eyre!("{:?} is not a chain id: {}", s, e))
}
