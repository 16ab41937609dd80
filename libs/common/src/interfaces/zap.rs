use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Zap deployment used by the hosted frontend
pub const VAULT_ZAP_ADDRESS: Address = address!("88F7fa216A9bE4685cEC8adfd9CaD01C2db42e92");

sol! {
    interface IVaultZap {
        /// Split of a single-token deposit: how much of `tokenIn` is swapped
        /// and what it buys of the pair's other token
        function estimateSwap(address aquaVault, address tokenIn, uint256 fullInvestmentIn)
            external
            view
            returns (uint256 swapAmountIn, uint256 swapAmountOut, address swapTokenOut);
    }
}
