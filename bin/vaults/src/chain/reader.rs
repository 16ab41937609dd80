use super::errors::ChainError;
use super::types::{
    RawVaultInfo, ReadResult, StrategyInfo, SwapEstimate, TokenDetails, ValuationReads,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

/// Read-only view of the vault contracts
///
/// Batched methods return one entry per input, in input order, with per-call
/// failures kept separate so callers decide whether a failure aborts the batch.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Every vault address the registry knows about
    async fn vault_addresses(&self) -> Result<Vec<Address>, ChainError>;

    async fn vault_infos(
        &self,
        vaults: &[Address],
    ) -> Result<Vec<ReadResult<RawVaultInfo>>, ChainError>;

    /// Balance, LP price, decimals and LP info for each `(vault, lp_token)` pair
    async fn vault_valuations(
        &self,
        targets: &[(Address, Address)],
    ) -> Result<Vec<ValuationReads>, ChainError>;

    async fn lp_balances(
        &self,
        owner: Address,
        lp_tokens: &[Address],
    ) -> Result<Vec<ReadResult<U256>>, ChainError>;

    async fn token_details(
        &self,
        tokens: &[Address],
    ) -> Result<Vec<ReadResult<TokenDetails>>, ChainError>;

    async fn strategy_info(&self, strategy: Address) -> Result<StrategyInfo, ChainError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Ask the zap contract how a deposit of `amount_in` of `token_in` into
    /// `vault` would be swapped
    async fn estimate_swap(
        &self,
        zap: Address,
        vault: Address,
        token_in: Address,
        amount_in: U256,
    ) -> Result<SwapEstimate, ChainError>;
}
