use super::errors::TxError;
use super::state::TxId;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use common::interfaces::erc20::IERC20;
use derive_builder::Builder;
use eyre::Result;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_SUBMITTING: &str = "Please confirm transaction in wallet...";
pub const DEFAULT_MINING: &str = "Transaction submitted, waiting for confirmation...";
pub const DEFAULT_SUCCESS: &str = "Transaction successful!";
pub const DEFAULT_ERROR: &str = "Transaction failed";
pub const CONNECT_WALLET: &str = "Connect wallet to continue";

/// One encoded contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Solidity signature of the called function, for logs
    pub function: &'static str,
}

impl ContractCall {
    pub fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode().into(),
            value: U256::ZERO,
            function: C::SIGNATURE,
        }
    }

    pub fn approve(token: Address, spender: Address, amount: U256) -> Self {
        Self::new(token, &IERC20::approveCall { spender, amount })
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.function, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// One transaction through `eth_sendTransaction`
    Single(ContractCall),
    /// Several calls executed atomically through `wallet_sendCalls`
    Batched(Vec<ContractCall>),
}

impl WriteTarget {
    pub fn calls(&self) -> &[ContractCall] {
        match self {
            WriteTarget::Single(call) => std::slice::from_ref(call),
            WriteTarget::Batched(calls) => calls,
        }
    }
}

/// Blocks submission while `condition` holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableCondition {
    pub condition: bool,
    pub message: String,
}

impl DisableCondition {
    pub fn new(condition: bool, message: impl Into<String>) -> Self {
        Self {
            condition,
            message: message.into(),
        }
    }
}

/// ERC-20 allowance the main call needs before it can succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceRequirement {
    pub token: Address,
    pub decimals: u8,
    pub symbol: String,
    pub spender: Address,
    /// Human readable amount, parsed with `decimals`
    pub required_amount: String,
}

/// Per-intent overrides of the lifecycle notification texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToastMessages {
    pub submitting: Option<String>,
    pub mining: Option<String>,
    pub success: Option<String>,
    pub error: Option<String>,
}

impl ToastMessages {
    pub fn approval(symbol: &str) -> Self {
        Self {
            submitting: Some(format!("Confirm {} approval in wallet...", symbol)),
            mining: Some(format!("Approving {}...", symbol)),
            success: Some(format!("{} approved successfully!", symbol)),
            error: Some(format!("Failed to approve {}", symbol)),
        }
    }

    pub fn batched(symbol: &str) -> Self {
        Self {
            submitting: Some(format!(
                "Confirm {} approval & transaction in wallet...",
                symbol
            )),
            mining: Some("Processing batched transaction...".to_string()),
            success: Some("Transaction completed successfully!".to_string()),
            error: Some(DEFAULT_ERROR.to_string()),
        }
    }

    pub fn submitting(&self) -> &str {
        self.submitting.as_deref().unwrap_or(DEFAULT_SUBMITTING)
    }

    pub fn mining(&self) -> &str {
        self.mining.as_deref().unwrap_or(DEFAULT_MINING)
    }

    pub fn success(&self) -> &str {
        self.success.as_deref().unwrap_or(DEFAULT_SUCCESS)
    }

    /// Override, else the error's own message, else the generic failure text
    pub fn error_for(&self, err: &TxError) -> String {
        if let Some(message) = &self.error {
            return message.clone();
        }
        let message = err.to_string();
        if message.is_empty() {
            DEFAULT_ERROR.to_string()
        } else {
            message
        }
    }
}

pub type SuccessCallback = Arc<dyn Fn(&TxId) + Send + Sync>;
pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&TxError) + Send + Sync>;

/// Everything needed to perform one user-initiated write
#[derive(Builder, Clone)]
#[builder(pattern = "owned", build_fn(skip))]
pub struct WriteIntent {
    pub target: WriteTarget,

    #[builder(setter(strip_option))]
    pub allowance: Option<AllowanceRequirement>,

    #[builder(setter(custom))]
    pub disable_conditions: Vec<DisableCondition>,

    pub messages: ToastMessages,

    /// Action label, e.g. "Deposit"
    #[builder(setter(into))]
    pub label: String,

    /// Invalidate the read cache once the write confirms
    pub invalidate_on_success: bool,

    #[builder(setter(custom))]
    pub on_success: Option<SuccessCallback>,

    #[builder(setter(custom))]
    pub on_refresh: Option<RefreshCallback>,

    #[builder(setter(custom))]
    pub on_error: Option<ErrorCallback>,
}

impl WriteIntent {
    pub fn builder() -> WriteIntentBuilder {
        WriteIntentBuilder::default()
    }

    /// First disable condition that holds
    pub fn disabled_reason(&self) -> Option<&str> {
        self.disable_conditions
            .iter()
            .find(|c| c.condition)
            .map(|c| c.message.as_str())
    }
}

impl WriteIntentBuilder {
    /// Append a disable condition; conditions are checked in insertion order
    pub fn disabled_when(mut self, condition: bool, message: impl Into<String>) -> Self {
        self.disable_conditions
            .get_or_insert_with(Vec::new)
            .push(DisableCondition::new(condition, message));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&TxId) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Some(Arc::new(f)));
        self
    }

    pub fn on_refresh(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Some(Arc::new(f)));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&TxError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Some(Arc::new(f)));
        self
    }

    pub fn build(self) -> Result<WriteIntent> {
        let target = self
            .target
            .ok_or_else(|| eyre::eyre!("target is required"))?;
        if target.calls().is_empty() {
            eyre::bail!("batched target needs at least one call");
        }

        Ok(WriteIntent {
            target,
            allowance: self.allowance.flatten(),
            disable_conditions: self.disable_conditions.unwrap_or_default(),
            messages: self.messages.unwrap_or_default(),
            label: self.label.unwrap_or_else(|| "Submit".to_string()),
            invalidate_on_success: self.invalidate_on_success.unwrap_or(true),
            on_success: self.on_success.flatten(),
            on_refresh: self.on_refresh.flatten(),
            on_error: self.on_error.flatten(),
        })
    }
}
