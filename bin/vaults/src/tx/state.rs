use alloy_primitives::B256;
use serde::Serialize;
use std::fmt;

/// Identifier of a submitted write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum TxId {
    /// Hash of a single transaction
    Hash(B256),
    /// Id returned by `wallet_sendCalls`
    Calls(String),
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxId::Hash(hash) => write!(f, "{}", hash),
            TxId::Calls(id) => write!(f, "calls {}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum TransactionState {
    #[default]
    Idle,
    AwaitingWalletConfirmation,
    Submitted(TxId),
    Confirming(TxId),
    Confirmed(TxId),
    Failed(String),
}

impl TransactionState {
    /// A write is between the wallet prompt and its final receipt
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransactionState::AwaitingWalletConfirmation
                | TransactionState::Submitted(_)
                | TransactionState::Confirming(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Confirmed(_) | TransactionState::Failed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_states() {
        let id = TxId::Calls("0x01".to_string());
        assert!(!TransactionState::Idle.is_in_flight());
        assert!(TransactionState::AwaitingWalletConfirmation.is_in_flight());
        assert!(TransactionState::Submitted(id.clone()).is_in_flight());
        assert!(TransactionState::Confirming(id.clone()).is_in_flight());
        assert!(!TransactionState::Confirmed(id.clone()).is_in_flight());
        assert!(TransactionState::Confirmed(id).is_terminal());
        assert!(TransactionState::Failed("x".into()).is_terminal());
    }
}
