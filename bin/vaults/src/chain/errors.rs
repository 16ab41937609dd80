//! Error types for chain reads

use alloy_primitives::Address;
use std::fmt;
use thiserror::Error;

/// Logical read inside a multicall batch, used to say which read failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    VaultInfo,
    VaultBalance,
    LpValue,
    Decimals,
    LpInfo,
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadKind::VaultInfo => write!(f, "vault info"),
            ReadKind::VaultBalance => write!(f, "vault balance"),
            ReadKind::LpValue => write!(f, "LP value"),
            ReadKind::Decimals => write!(f, "decimals"),
            ReadKind::LpInfo => write!(f, "LP info"),
        }
    }
}

/// Errors that can occur while reading chain state
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Failed to decode {call}: {reason}")]
    Decode { call: &'static str, reason: String },

    #[error("Failed to fetch {read} for {target}: {reason}")]
    MulticallFailure {
        read: ReadKind,
        target: Address,
        reason: String,
    },

    #[error("Invalid token data for vault at address: {0}")]
    InvalidTokenData(Address),

    #[error("Unable to get LP balance for {lp_token}: {reason}")]
    LpBalance { lp_token: Address, reason: String },

    #[error("Failed to get token details for {token}: {reason}")]
    TokenDetails { token: Address, reason: String },

    #[error("Multicall returned {got} results for {expected} calls")]
    ResultCountMismatch { expected: usize, got: usize },
}

impl ChainError {
    pub fn multicall_failure(read: ReadKind, target: Address, reason: impl Into<String>) -> Self {
        ChainError::MulticallFailure {
            read,
            target,
            reason: reason.into(),
        }
    }
}
