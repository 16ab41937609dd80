//! Read-side procedures served from the unified snapshot.

use crate::apy::MarketApyMap;
use crate::cache::UnifiedSnapshot;
use crate::chain::{ChainError, ChainReader, StrategyInfo, TokenDetails, VaultConfig, VaultTvl};
use crate::valuation::{derive_lp_breakdown, LpBreakdown, LpBreakdownInput};
use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use common::units::{format_units, to_f64};
use serde::Serialize;

const NAME_SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTableEntry {
    pub address: Address,
    pub name: String,
    pub tvl_usd: f64,
    pub wallet_balance_usd: f64,
    pub user_deposit_usd: f64,
    pub apy: f64,
    pub platform_id: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigEntry {
    pub address: Address,
    #[serde(flatten)]
    pub config: VaultConfig,
}

/// Token with its reserve and USD price inside the vault's LP position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultToken {
    #[serde(flatten)]
    pub details: TokenDetails,
    pub reserve: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTokens {
    pub token0: VaultToken,
    pub token1: VaultToken,
    pub lp_token: VaultToken,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDetail {
    pub address: Address,
    pub id: String,
    pub name: String,
    pub platform_id: String,
    pub config: VaultConfig,
    pub tvl_usd: f64,
    pub tvl: Option<VaultTvl>,
    pub tokens: VaultTokens,
    pub strategy: StrategyInfo,
    pub lp_breakdown: LpBreakdown,
    pub deposit_fee: String,
    pub withdraw_fee: String,
    pub last_harvest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLpBalance {
    pub vault: Address,
    pub lp_token: Address,
    pub raw_balance: U256,
    pub balance: f64,
    pub balance_usd: f64,
}

/// Split a registry name `"{platform}-{long}-{short}"` into platform id and
/// display name `"{long}/{short}"`
pub fn display_name(registry_name: &str) -> (String, String) {
    let mut parts = registry_name.split(NAME_SEPARATOR);
    let platform = parts.next().filter(|p| !p.is_empty());
    match (platform, parts.next(), parts.next()) {
        (Some(platform), Some(long), Some(short)) => {
            (platform.to_string(), format!("{}/{}", long, short))
        }
        _ => ("Unknown".to_string(), registry_name.to_string()),
    }
}

/// Unpaused vaults sorted by id; vaults missing from `apys` show zero yield
pub fn vault_table(snapshot: &UnifiedSnapshot, apys: &MarketApyMap) -> Vec<VaultTableEntry> {
    let mut entries: Vec<VaultTableEntry> = snapshot
        .registry
        .vault_configs
        .iter()
        .filter(|(_, config)| !config.is_paused)
        .map(|(address, config)| {
            let (platform_id, name) = display_name(&config.name);
            VaultTableEntry {
                address: *address,
                name,
                tvl_usd: snapshot
                    .vault_tvl
                    .get(address)
                    .map(|t| t.usd_value)
                    .unwrap_or(0.0),
                wallet_balance_usd: 0.0,
                user_deposit_usd: 0.0,
                apy: apys.get(address).map(|a| a.apy).unwrap_or(0.0),
                platform_id,
                id: config.name.clone(),
            }
        })
        .collect();

    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

pub fn vault_configs(snapshot: &UnifiedSnapshot) -> Vec<VaultConfigEntry> {
    let mut entries: Vec<VaultConfigEntry> = snapshot
        .registry
        .vault_configs
        .iter()
        .map(|(address, config)| VaultConfigEntry {
            address: *address,
            config: config.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.config.name.cmp(&b.config.name));
    entries
}

/// Resolve a vault by address or by case-insensitive registry name
pub fn resolve_vault(snapshot: &UnifiedSnapshot, id: &str) -> Option<Address> {
    if let Ok(address) = id.parse::<Address>() {
        if snapshot.registry.vault_configs.contains_key(&address) {
            return Some(address);
        }
    }
    snapshot.registry.lookup_name(id)
}

pub async fn vault_detail<R>(
    snapshot: &UnifiedSnapshot,
    reader: &R,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<VaultDetail>, ChainError>
where
    R: ChainReader + ?Sized,
{
    let Some(address) = resolve_vault(snapshot, id) else {
        return Ok(None);
    };
    let Some(config) = snapshot.registry.vault_configs.get(&address).cloned() else {
        return Ok(None);
    };
    let tvl = snapshot.vault_tvl.get(&address).cloned();

    let token_addresses = [config.token0, config.token1, config.lp_token];
    let mut details = Vec::with_capacity(3);
    for (token, result) in token_addresses
        .iter()
        .zip(reader.token_details(&token_addresses).await?)
    {
        details.push(result.map_err(|reason| ChainError::TokenDetails {
            token: *token,
            reason,
        })?);
    }
    let [token0, token1, lp_token]: [TokenDetails; 3] = details
        .try_into()
        .map_err(|_| ChainError::InvalidTokenData(address))?;

    let strategy = reader.strategy_info(config.strategy).await?;

    let (input, lp_price) = match &tvl {
        Some(tvl) => (
            LpBreakdownInput::from_lp_info(
                &tvl.lp_info,
                token0.decimals,
                token1.decimals,
                to_f64(tvl.raw_balance, tvl.decimals),
                tvl.lp_price,
            ),
            tvl.lp_price,
        ),
        None => (LpBreakdownInput::default(), 0.0),
    };

    let tokens = VaultTokens {
        token0: VaultToken {
            details: token0,
            reserve: input.token0_reserve,
            price: input.token0_price,
        },
        token1: VaultToken {
            details: token1,
            reserve: input.token1_reserve,
            price: input.token1_price,
        },
        lp_token: VaultToken {
            details: lp_token,
            reserve: input.lp_reserve,
            price: lp_price,
        },
    };

    let (platform_id, name) = display_name(&config.name);

    Ok(Some(VaultDetail {
        address,
        id: config.name.clone(),
        name,
        platform_id,
        tvl_usd: tvl.as_ref().map(|t| t.usd_value).unwrap_or(0.0),
        tvl,
        tokens,
        lp_breakdown: derive_lp_breakdown(input),
        deposit_fee: format_fee_percentage(strategy.deposit_fee),
        withdraw_fee: format_fee_percentage(strategy.withdraw_fee),
        last_harvest: format_last_harvest(strategy.last_harvest, now),
        strategy,
        config,
    }))
}

/// Wallet LP balances of `user` for every vault with a TVL entry
pub async fn user_balances<R>(
    snapshot: &UnifiedSnapshot,
    reader: &R,
    user: Address,
) -> Result<Vec<UserLpBalance>, ChainError>
where
    R: ChainReader + ?Sized,
{
    let mut entries: Vec<(&Address, &VaultTvl)> = snapshot.vault_tvl.iter().collect();
    entries.sort_by_key(|(vault, _)| **vault);

    let lp_tokens: Vec<Address> = entries.iter().map(|(_, tvl)| tvl.lp_token).collect();
    let results = reader.lp_balances(user, &lp_tokens).await?;

    entries
        .into_iter()
        .zip(results)
        .map(|((vault, tvl), result)| {
            let raw_balance = result.map_err(|reason| ChainError::LpBalance {
                lp_token: tvl.lp_token,
                reason,
            })?;
            let balance = to_f64(raw_balance, tvl.decimals);
            Ok(UserLpBalance {
                vault: *vault,
                lp_token: tvl.lp_token,
                raw_balance,
                balance,
                balance_usd: balance * tvl.lp_price,
            })
        })
        .collect()
}

/// Fee in basis points rendered as a percentage, e.g. `50` is `"0.5%"`
pub fn format_fee_percentage(fee: Option<U256>) -> String {
    match fee {
        Some(fee) => format!("{}%", format_units(fee, 2)),
        None => "0%".to_string(),
    }
}

pub fn format_last_harvest(timestamp: Option<U256>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp.filter(|t| !t.is_zero()) else {
        return "Never".to_string();
    };
    let Some(timestamp) = u64::try_from(timestamp)
        .ok()
        .and_then(|t| i64::try_from(t).ok())
    else {
        return "Recently".to_string();
    };

    let hours = (now.timestamp() - timestamp).div_euclid(3600);
    let days = hours.div_euclid(24);
    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else {
        "Recently".to_string()
    }
}
