use crate::cache::CacheTtl;
use crate::tx::PollPolicy;
use alloy_primitives::Address;
use common::interfaces::multicall::MULTICALL3_ADDRESS;
use common::interfaces::zap::VAULT_ZAP_ADDRESS;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultsConfig {
    pub chain: ChainConfig,
    pub cache: CacheConfig,
    pub polling: PollingConfig,
    pub api: ApiConfig,
    pub gte: GteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub registry_address: Option<Address>,
    pub lp_oracle_address: Option<Address>,
    pub multicall_address: Address,
    pub zap_address: Address,
    /// Hex encoded signing key, only needed for deposit/withdraw
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            registry_address: None,
            lp_oracle_address: None,
            multicall_address: MULTICALL3_ADDRESS,
            zap_address: VAULT_ZAP_ADDRESS,
            private_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub config_ttl_secs: u64,
    pub tvl_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttl = CacheTtl::default();
        Self {
            config_ttl_secs: ttl.config_ttl.as_secs(),
            tvl_ttl_secs: ttl.tvl_ttl.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_wait_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            initial_interval_ms: policy.initial_interval.as_millis() as u64,
            max_interval_ms: policy.max_interval.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            max_wait_secs: policy.max_wait.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Market data API used for vault yields; yields are zero when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GteConfig {
    pub api_url: Option<String>,
}

fn env_address(name: &str) -> Result<Option<Address>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} is not a valid address: {}", name, value)),
        _ => Ok(None),
    }
}

impl VaultsConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: VaultsConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    /// Load from `path` if given, then fill unset chain values from the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(rpc_url) = std::env::var("RPC_URL") {
            if !rpc_url.trim().is_empty() {
                self.chain.rpc_url = rpc_url;
            }
        }
        if self.chain.registry_address.is_none() {
            self.chain.registry_address = env_address("REGISTRY_ADDRESS")?;
        }
        if self.chain.lp_oracle_address.is_none() {
            self.chain.lp_oracle_address = env_address("LP_ORACLE_ADDRESS")?;
        }
        if let Some(multicall) = env_address("MULTICALL3_ADDRESS")? {
            self.chain.multicall_address = multicall;
        }
        if let Some(zap) = env_address("ZAP_ADDRESS")? {
            self.chain.zap_address = zap;
        }
        if self.gte.api_url.is_none() {
            self.gte.api_url = std::env::var("GTE_API").ok().filter(|u| !u.trim().is_empty());
        }
        if self.chain.private_key.is_none() {
            self.chain.private_key = std::env::var("PRIVATE_KEY").ok().filter(|k| !k.is_empty());
        }
        Ok(())
    }

    pub fn registry_address(&self) -> Result<Address> {
        self.chain
            .registry_address
            .ok_or_else(|| eyre::eyre!("Registry address not configured (set REGISTRY_ADDRESS)"))
    }

    pub fn lp_oracle_address(&self) -> Result<Address> {
        self.chain
            .lp_oracle_address
            .ok_or_else(|| eyre::eyre!("LP oracle address not configured (set LP_ORACLE_ADDRESS)"))
    }

    pub fn private_key(&self) -> Result<&str> {
        self.chain
            .private_key
            .as_deref()
            .ok_or_else(|| eyre::eyre!("Private key not configured (set PRIVATE_KEY)"))
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl {
            config_ttl: Duration::from_secs(self.cache.config_ttl_secs),
            tvl_ttl: Duration::from_secs(self.cache.tvl_ttl_secs),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.polling.initial_interval_ms),
            max_interval: Duration::from_millis(self.polling.max_interval_ms),
            backoff_multiplier: self.polling.backoff_multiplier,
            max_wait: Duration::from_secs(self.polling.max_wait_secs),
        }
    }
}
