//! In-memory chain state that answers [`ChainReader`] queries without an RPC.

use super::errors::ChainError;
use super::reader::ChainReader;
use super::types::{
    LpInfo, RawVaultInfo, ReadResult, StrategyInfo, SwapEstimate, TokenDetails, ValuationReads,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// On-chain state of one simulated vault
#[derive(Debug, Clone)]
pub struct SimulatedVault {
    pub info: ReadResult<RawVaultInfo>,
    pub balance: ReadResult<U256>,
    pub lp_value: ReadResult<U256>,
    pub decimals: ReadResult<u8>,
    pub lp_info: ReadResult<LpInfo>,
}

impl SimulatedVault {
    pub fn new(name: &str, strategy: Address, tokens: [Address; 3]) -> Self {
        let [_, token0, token1] = tokens;
        Self {
            info: Ok(RawVaultInfo {
                name: name.to_string(),
                strategy,
                is_paused: false,
                tokens: tokens.to_vec(),
                block_number: U256::from(1u64),
                retired: false,
                gas_overhead: U256::ZERO,
            }),
            balance: Ok(U256::ZERO),
            lp_value: Ok(U256::ZERO),
            decimals: Ok(18),
            lp_info: Ok(LpInfo {
                token0,
                token1,
                symbol0: String::new(),
                symbol1: String::new(),
                reserve0: U256::ZERO,
                reserve1: U256::ZERO,
                price0: U256::ZERO,
                price1: U256::ZERO,
                fair_value: U256::ZERO,
            }),
        }
    }

    pub fn with_valuation(mut self, balance: U256, lp_value: U256) -> Self {
        self.balance = Ok(balance);
        self.lp_value = Ok(lp_value);
        self
    }

    pub fn paused(mut self) -> Self {
        if let Ok(info) = self.info.as_mut() {
            info.is_paused = true;
        }
        self
    }
}

fn reverted<T>() -> ReadResult<T> {
    Err("execution reverted".to_string())
}

#[derive(Default)]
struct SimulatedState {
    vaults: Vec<(Address, SimulatedVault)>,
    tokens: HashMap<Address, TokenDetails>,
    strategies: HashMap<Address, StrategyInfo>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    swap_estimates: HashMap<(Address, Address), SwapEstimate>,
}

#[derive(Default)]
pub struct SimulatedChainReader {
    state: RwLock<SimulatedState>,
    read_delay: Option<Duration>,
    registry_reads: AtomicUsize,
    valuation_reads: AtomicUsize,
    allowance_reads: AtomicUsize,
}

impl SimulatedChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every registry read, to widen race windows in tests
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn add_vault(&self, address: Address, vault: SimulatedVault) {
        self.state.write().vaults.push((address, vault));
    }

    /// Mutate a vault in place; unknown addresses are ignored
    pub fn update_vault(&self, address: Address, f: impl FnOnce(&mut SimulatedVault)) {
        let mut state = self.state.write();
        if let Some((_, vault)) = state.vaults.iter_mut().find(|(a, _)| *a == address) {
            f(vault);
        }
    }

    pub fn add_token(&self, details: TokenDetails) {
        self.state.write().tokens.insert(details.address, details);
    }

    pub fn set_strategy(&self, strategy: Address, info: StrategyInfo) {
        self.state.write().strategies.insert(strategy, info);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.write().balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .write()
            .allowances
            .insert((token, owner, spender), amount);
    }

    /// Answer `estimate_swap` for `(vault, token_in)`; unset pairs revert
    pub fn set_swap_estimate(&self, vault: Address, token_in: Address, estimate: SwapEstimate) {
        self.state
            .write()
            .swap_estimates
            .insert((vault, token_in), estimate);
    }

    pub fn registry_reads(&self) -> usize {
        self.registry_reads.load(Ordering::SeqCst)
    }

    pub fn valuation_reads(&self) -> usize {
        self.valuation_reads.load(Ordering::SeqCst)
    }

    pub fn allowance_reads(&self) -> usize {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    fn vault(&self, address: Address) -> Option<SimulatedVault> {
        self.state
            .read()
            .vaults
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl ChainReader for SimulatedChainReader {
    async fn vault_addresses(&self) -> Result<Vec<Address>, ChainError> {
        self.registry_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.read().vaults.iter().map(|(a, _)| *a).collect())
    }

    async fn vault_infos(
        &self,
        vaults: &[Address],
    ) -> Result<Vec<ReadResult<RawVaultInfo>>, ChainError> {
        Ok(vaults
            .iter()
            .map(|address| match self.vault(*address) {
                Some(vault) => vault.info,
                None => reverted(),
            })
            .collect())
    }

    async fn vault_valuations(
        &self,
        targets: &[(Address, Address)],
    ) -> Result<Vec<ValuationReads>, ChainError> {
        self.valuation_reads.fetch_add(1, Ordering::SeqCst);

        Ok(targets
            .iter()
            .map(|(address, _)| match self.vault(*address) {
                Some(vault) => ValuationReads {
                    balance: vault.balance,
                    lp_value: vault.lp_value,
                    decimals: vault.decimals,
                    lp_info: vault.lp_info,
                },
                None => ValuationReads {
                    balance: reverted(),
                    lp_value: reverted(),
                    decimals: reverted(),
                    lp_info: reverted(),
                },
            })
            .collect())
    }

    async fn lp_balances(
        &self,
        owner: Address,
        lp_tokens: &[Address],
    ) -> Result<Vec<ReadResult<U256>>, ChainError> {
        let state = self.state.read();
        Ok(lp_tokens
            .iter()
            .map(|token| Ok(state.balances.get(&(*token, owner)).copied().unwrap_or_default()))
            .collect())
    }

    async fn token_details(
        &self,
        tokens: &[Address],
    ) -> Result<Vec<ReadResult<TokenDetails>>, ChainError> {
        let state = self.state.read();
        Ok(tokens
            .iter()
            .map(|token| {
                state
                    .tokens
                    .get(token)
                    .cloned()
                    .map_or_else(reverted, Ok)
            })
            .collect())
    }

    async fn strategy_info(&self, strategy: Address) -> Result<StrategyInfo, ChainError> {
        Ok(self
            .state
            .read()
            .strategies
            .get(&strategy)
            .cloned()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .read()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn estimate_swap(
        &self,
        _zap: Address,
        vault: Address,
        token_in: Address,
        _amount_in: U256,
    ) -> Result<SwapEstimate, ChainError> {
        self.state
            .read()
            .swap_estimates
            .get(&(vault, token_in))
            .copied()
            .ok_or_else(|| ChainError::Rpc("execution reverted".to_string()))
    }
}
