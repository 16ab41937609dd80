use super::errors::ChainError;
use super::reader::ChainReader;
use super::types::{
    LpInfo, RawVaultInfo, ReadResult, StrategyInfo, SwapEstimate, TokenDetails, ValuationReads,
};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{hex, Address, U256};
use alloy_sol_types::{decode_revert_reason, SolCall};
use async_trait::async_trait;
use common::interfaces::erc20::IERC20;
use common::interfaces::lp_oracle::ILpShareOracle;
use common::interfaces::multicall::IMulticall3;
use common::interfaces::registry::IVaultRegistry;
use common::interfaces::strategy::IStrategy;
use common::interfaces::vault::IVault;
use common::interfaces::zap::IVaultZap;

/// Chain reader that batches everything through Multicall3 `aggregate3`
pub struct RpcChainReader<P> {
    provider: P,
    registry: Address,
    lp_oracle: Address,
    multicall: Address,
}

impl<P> RpcChainReader<P>
where
    P: Provider,
{
    pub fn new(provider: P, registry: Address, lp_oracle: Address, multicall: Address) -> Self {
        Self {
            provider,
            registry,
            lp_oracle,
            multicall,
        }
    }

    async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, ChainError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());

        let result_bytes = self
            .provider
            .call(tx)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        C::abi_decode_returns(&result_bytes).map_err(|e| ChainError::Decode {
            call: C::SIGNATURE,
            reason: e.to_string(),
        })
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::CallResult>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let expected = calls.len();
        tracing::debug!("Multicall of {} reads", expected);

        let results = self
            .read(self.multicall, IMulticall3::aggregate3Call { calls })
            .await?;

        if results.len() != expected {
            return Err(ChainError::ResultCountMismatch {
                expected,
                got: results.len(),
            });
        }
        Ok(results)
    }
}

fn call3<C: SolCall>(target: Address, call: &C) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: true,
        callData: call.abi_encode().into(),
    }
}

fn decode<C: SolCall>(result: &IMulticall3::CallResult) -> ReadResult<C::Return> {
    if !result.success {
        return Err(revert_reason(&result.returnData));
    }
    C::abi_decode_returns(&result.returnData).map_err(|e| e.to_string())
}

fn revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "execution reverted".to_string();
    }
    decode_revert_reason(data)
        .unwrap_or_else(|| format!("execution reverted: 0x{}", hex::encode(data)))
}

#[async_trait]
impl<P> ChainReader for RpcChainReader<P>
where
    P: Provider + 'static,
{
    async fn vault_addresses(&self) -> Result<Vec<Address>, ChainError> {
        self.read(self.registry, IVaultRegistry::allVaultAddressesCall {})
            .await
    }

    async fn vault_infos(
        &self,
        vaults: &[Address],
    ) -> Result<Vec<ReadResult<RawVaultInfo>>, ChainError> {
        let calls = vaults
            .iter()
            .map(|vault| call3(self.registry, &IVaultRegistry::getVaultInfoCall { vault: *vault }))
            .collect();

        let results = self.aggregate(calls).await?;

        Ok(results
            .iter()
            .map(|r| {
                decode::<IVaultRegistry::getVaultInfoCall>(r).map(|info| RawVaultInfo {
                    name: info.name,
                    strategy: info.strategy,
                    is_paused: info.isPaused,
                    tokens: info.tokens,
                    block_number: info.blockNumber,
                    retired: info.retired,
                    gas_overhead: info.gasOverhead,
                })
            })
            .collect())
    }

    async fn vault_valuations(
        &self,
        targets: &[(Address, Address)],
    ) -> Result<Vec<ValuationReads>, ChainError> {
        // Four reads per vault: balance, LP value, decimals, LP info
        let mut calls = Vec::with_capacity(targets.len() * 4);
        for (vault, lp_token) in targets {
            calls.push(call3(*vault, &IVault::balanceCall {}));
            calls.push(call3(
                self.lp_oracle,
                &ILpShareOracle::calculateLPValueCall { lpToken: *lp_token },
            ));
            calls.push(call3(*lp_token, &IERC20::decimalsCall {}));
            calls.push(call3(
                self.lp_oracle,
                &ILpShareOracle::getLPInfoCall { lpToken: *lp_token },
            ));
        }

        let results = self.aggregate(calls).await?;

        Ok(results
            .chunks(4)
            .map(|chunk| ValuationReads {
                balance: decode::<IVault::balanceCall>(&chunk[0]),
                lp_value: decode::<ILpShareOracle::calculateLPValueCall>(&chunk[1]),
                decimals: decode::<IERC20::decimalsCall>(&chunk[2]),
                lp_info: decode::<ILpShareOracle::getLPInfoCall>(&chunk[3]).map(|info| LpInfo {
                    token0: info.token0,
                    token1: info.token1,
                    symbol0: info.symbol0,
                    symbol1: info.symbol1,
                    reserve0: info.reserve0,
                    reserve1: info.reserve1,
                    price0: info.price0,
                    price1: info.price1,
                    fair_value: info.fairValue,
                }),
            })
            .collect())
    }

    async fn lp_balances(
        &self,
        owner: Address,
        lp_tokens: &[Address],
    ) -> Result<Vec<ReadResult<U256>>, ChainError> {
        let calls = lp_tokens
            .iter()
            .map(|token| call3(*token, &IERC20::balanceOfCall { account: owner }))
            .collect();

        let results = self.aggregate(calls).await?;
        Ok(results.iter().map(decode::<IERC20::balanceOfCall>).collect())
    }

    async fn token_details(
        &self,
        tokens: &[Address],
    ) -> Result<Vec<ReadResult<TokenDetails>>, ChainError> {
        let mut calls = Vec::with_capacity(tokens.len() * 3);
        for token in tokens {
            calls.push(call3(*token, &IERC20::nameCall {}));
            calls.push(call3(*token, &IERC20::symbolCall {}));
            calls.push(call3(*token, &IERC20::decimalsCall {}));
        }

        let results = self.aggregate(calls).await?;

        Ok(tokens
            .iter()
            .zip(results.chunks(3))
            .map(|(token, chunk)| {
                Ok(TokenDetails {
                    address: *token,
                    name: decode::<IERC20::nameCall>(&chunk[0])?,
                    symbol: decode::<IERC20::symbolCall>(&chunk[1])?,
                    decimals: decode::<IERC20::decimalsCall>(&chunk[2])?,
                })
            })
            .collect())
    }

    async fn strategy_info(&self, strategy: Address) -> Result<StrategyInfo, ChainError> {
        let calls = vec![
            call3(strategy, &IStrategy::lastHarvestCall {}),
            call3(strategy, &IStrategy::depositFeeCall {}),
            call3(strategy, &IStrategy::withdrawFeeCall {}),
        ];

        let results = self.aggregate(calls).await?;

        Ok(StrategyInfo {
            last_harvest: decode::<IStrategy::lastHarvestCall>(&results[0]).ok(),
            deposit_fee: decode::<IStrategy::depositFeeCall>(&results[1]).ok(),
            withdraw_fee: decode::<IStrategy::withdrawFeeCall>(&results[2]).ok(),
        })
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.read(token, IERC20::allowanceCall { owner, spender }).await
    }

    async fn estimate_swap(
        &self,
        zap: Address,
        vault: Address,
        token_in: Address,
        amount_in: U256,
    ) -> Result<SwapEstimate, ChainError> {
        let estimate = self
            .read(
                zap,
                IVaultZap::estimateSwapCall {
                    aquaVault: vault,
                    tokenIn: token_in,
                    fullInvestmentIn: amount_in,
                },
            )
            .await?;

        Ok(SwapEstimate {
            swap_amount_in: estimate.swapAmountIn,
            swap_amount_out: estimate.swapAmountOut,
            swap_token_out: estimate.swapTokenOut,
        })
    }
}
