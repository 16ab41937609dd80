use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::collections::HashMap;

/// Per-call outcome of a batched read; the error is the decoded revert reason
pub type ReadResult<T> = Result<T, String>;

/// `getVaultInfo` exactly as the registry returns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVaultInfo {
    pub name: String,
    pub strategy: Address,
    pub is_paused: bool,
    pub tokens: Vec<Address>,
    pub block_number: U256,
    pub retired: bool,
    pub gas_overhead: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub name: String,
    pub strategy: Address,
    pub is_paused: bool,
    pub token0: Address,
    pub token1: Address,
    pub lp_token: Address,
    pub block_number: U256,
    pub retired: bool,
    pub gas_overhead: U256,
}

/// Constituent reserves and oracle prices for an LP token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpInfo {
    pub token0: Address,
    pub token1: Address,
    pub symbol0: String,
    pub symbol1: String,
    pub reserve0: U256,
    pub reserve1: U256,
    pub price0: U256,
    pub price1: U256,
    pub fair_value: U256,
}

/// Valuation of the LP tokens a vault holds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTvl {
    pub raw_balance: U256,
    pub usd_value: f64,
    pub lp_price: f64,
    pub lp_token: Address,
    pub decimals: u8,
    pub lp_info: LpInfo,
}

pub type VaultTvlMap = HashMap<Address, VaultTvl>;

/// The raw reads needed to value one vault
#[derive(Debug, Clone)]
pub struct ValuationReads {
    pub balance: ReadResult<U256>,
    pub lp_value: ReadResult<U256>,
    pub decimals: ReadResult<u8>,
    pub lp_info: ReadResult<LpInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDetails {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Strategy parameters; each field is `None` when its read reverted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub last_harvest: Option<U256>,
    pub deposit_fee: Option<U256>,
    pub withdraw_fee: Option<U256>,
}

/// How a single-token zap deposit splits `tokenIn` across the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEstimate {
    pub swap_amount_in: U256,
    pub swap_amount_out: U256,
    pub swap_token_out: Address,
}
