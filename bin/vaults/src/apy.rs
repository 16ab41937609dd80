//! Trading-fee yield of the LP markets behind each vault, from the GTE API.

use crate::cache::UnifiedSnapshot;
use alloy_primitives::Address;
use eyre::{eyre, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;

/// Pool fee taken on every swap (Uniswap V2 style 0.3%)
pub const SWAP_FEE: f64 = 0.003;
const DAYS_PER_YEAR: f64 = 365.0;

/// The fields of a GTE market that the yield is derived from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GteMarket {
    pub address: Address,
    #[serde(rename = "volume24HrUsd", default)]
    pub volume_24hr_usd: f64,
    #[serde(default)]
    pub tvl_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketApy {
    pub apy: f64,
    pub apr: f64,
}

pub type MarketApyMap = HashMap<Address, MarketApy>;

/// Annualised fee income over liquidity; zero when the pool holds nothing
pub fn market_apr(volume_24hr_usd: f64, tvl_usd: f64) -> f64 {
    if tvl_usd == 0.0 {
        return 0.0;
    }
    volume_24hr_usd * DAYS_PER_YEAR * SWAP_FEE / tvl_usd
}

/// Daily compounding of `apr`
pub fn apr_to_apy(apr: f64) -> f64 {
    (1.0 + apr / DAYS_PER_YEAR).powf(DAYS_PER_YEAR) - 1.0
}

impl From<&GteMarket> for MarketApy {
    fn from(market: &GteMarket) -> Self {
        let apr = market_apr(market.volume_24hr_usd, market.tvl_usd);
        Self {
            apy: apr_to_apy(apr),
            apr,
        }
    }
}

#[derive(Clone)]
pub struct GteClient {
    client: Client,
    base_url: String,
}

impl GteClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn market(&self, address: Address) -> Result<GteMarket> {
        let url = format!("{}/markets/{}", self.base_url, address);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(eyre!(
                "Failed to fetch GTE market {}: {}",
                address,
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    pub async fn market_apy(&self, address: Address) -> Result<MarketApy> {
        let market = self.market(address).await?;
        Ok(MarketApy::from(&market))
    }

    /// Yield of every vault in `snapshot`, keyed by vault address
    ///
    /// Markets are fetched concurrently; any failed fetch fails the whole map.
    /// Markets whose address matches no vault LP token are skipped.
    pub async fn vault_apys(&self, snapshot: &UnifiedSnapshot) -> Result<MarketApyMap> {
        let lp_to_vault: HashMap<Address, Address> = snapshot
            .registry
            .vault_configs
            .iter()
            .map(|(vault, config)| (config.lp_token, *vault))
            .collect();

        let mut fetches = JoinSet::new();
        for lp_token in lp_to_vault.keys().copied() {
            let client = self.clone();
            fetches.spawn(async move { client.market(lp_token).await });
        }

        let mut apys = MarketApyMap::new();
        while let Some(joined) = fetches.join_next().await {
            let market = joined.context("Market fetch task failed")??;
            match lp_to_vault.get(&market.address) {
                Some(vault) => {
                    apys.insert(*vault, MarketApy::from(&market));
                }
                None => tracing::warn!("GTE returned unknown market {}", market.address),
            }
        }

        tracing::debug!("Fetched yield for {} vaults", apys.len());
        Ok(apys)
    }
}
