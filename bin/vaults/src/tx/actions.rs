//! Deposit and withdraw intents for a vault.

use super::intent::{AllowanceRequirement, ContractCall, ToastMessages, WriteIntent, WriteTarget};
use crate::queries::VaultDetail;
use alloy_primitives::{Address, U256};
use common::interfaces::vault::IVault;
use common::units::{format_units, parse_units};
use eyre::Result;

/// The parts of a vault needed to build writes against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultTarget {
    pub address: Address,
    pub name: String,
    pub lp_token: Address,
    pub lp_decimals: u8,
    pub token0_symbol: String,
    pub token1_symbol: String,
}

impl VaultTarget {
    pub fn from_detail(detail: &VaultDetail) -> Self {
        Self {
            address: detail.address,
            name: detail.name.clone(),
            lp_token: detail.config.lp_token,
            lp_decimals: detail.tokens.lp_token.details.decimals,
            token0_symbol: detail.tokens.token0.details.symbol.clone(),
            token1_symbol: detail.tokens.token1.details.symbol.clone(),
        }
    }

    pub fn pair(&self) -> String {
        format!("{}/{}", self.token0_symbol, self.token1_symbol)
    }

    pub fn lp_symbol(&self) -> String {
        format!("{} LP", self.pair())
    }
}

/// Parsed amount, or zero when empty or unparsable
fn parse_or_zero(amount: &str, decimals: u8) -> U256 {
    parse_units(amount, decimals).unwrap_or(U256::ZERO)
}

/// Deposit `amount` LP tokens, approving the vault first when needed
pub fn deposit_intent(vault: &VaultTarget, amount: &str, lp_balance: U256) -> Result<WriteIntent> {
    let lp_symbol = vault.lp_symbol();
    let shares = parse_or_zero(amount, vault.lp_decimals);

    WriteIntent::builder()
        .target(WriteTarget::Single(ContractCall::new(
            vault.address,
            &IVault::depositCall { amount: shares },
        )))
        .allowance(AllowanceRequirement {
            token: vault.lp_token,
            decimals: vault.lp_decimals,
            symbol: lp_symbol.clone(),
            spender: vault.address,
            required_amount: amount.trim().to_string(),
        })
        .disabled_when(shares.is_zero(), "Enter an amount to deposit")
        .disabled_when(shares > lp_balance, format!("Insufficient {} balance", lp_symbol))
        .messages(ToastMessages {
            submitting: Some(format!("Depositing {} into {}...", lp_symbol, vault.name)),
            mining: Some(format!("Depositing {} into {}...", lp_symbol, vault.name)),
            success: Some(format!(
                "Successfully deposited {} into {}!",
                lp_symbol, vault.name
            )),
            error: Some(format!("Failed to deposit {} into {}.", lp_symbol, vault.name)),
        })
        .label("Deposit")
        .build()
}

/// Withdraw `amount` vault shares
pub fn withdraw_intent(
    vault: &VaultTarget,
    amount: &str,
    share_balance: U256,
    account: Option<Address>,
) -> Result<WriteIntent> {
    let pair = vault.pair();
    let shares = parse_or_zero(amount, vault.lp_decimals);

    WriteIntent::builder()
        .target(WriteTarget::Single(ContractCall::new(
            vault.address,
            &IVault::withdrawCall { shares },
        )))
        .disabled_when(account.is_none(), "Connect wallet to withdraw")
        .disabled_when(shares.is_zero(), "Enter an amount to withdraw")
        .disabled_when(shares > share_balance, "Insufficient vault balance")
        .messages(ToastMessages {
            submitting: Some(format!("Withdrawing {} from {}...", pair, vault.name)),
            mining: Some(format!("Withdrawing {} from {}...", pair, vault.name)),
            success: Some(format!("Successfully withdrawn {} from {}!", pair, vault.name)),
            error: Some(format!("Failed to withdraw {} from {}.", pair, vault.name)),
        })
        .label("Withdraw")
        .build()
}

/// Amount for a quick-pick button, e.g. `0.25` of the balance
pub fn amount_for_fraction(balance: U256, fraction: f64, decimals: u8) -> String {
    let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u64;
    format_units(balance * U256::from(percent) / U256::from(100u64), decimals)
}
