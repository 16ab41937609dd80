use super::state::TxId;
use alloy_primitives::Address;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`Wallet`](super::wallet::Wallet) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Wallet does not support {0}")]
    Unsupported(String),

    #[error("Wallet RPC error: {0}")]
    Rpc(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// A disable condition held; the message is shown to the user as is
    #[error("{0}")]
    Disabled(String),

    #[error("A transaction is already in flight")]
    AlreadyInFlight,

    #[error("No wallet account connected")]
    NoAccount,

    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Transaction {0} reverted")]
    Reverted(TxId),

    #[error("Batched calls {id} failed: {status}")]
    BatchFailed { id: String, status: String },

    #[error("Timed out after {waited:?} waiting for {id}")]
    Timeout { id: TxId, waited: Duration },

    #[error("Allowance for token {token} was not updated after approval")]
    AllowanceNotUpdated { token: Address },

    #[error("{0}")]
    Wallet(String),
}

impl From<WalletError> for TxError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(message) => TxError::Rejected(message),
            other => TxError::Wallet(other.to_string()),
        }
    }
}
