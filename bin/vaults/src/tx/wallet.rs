use super::errors::WalletError;
use super::intent::ContractCall;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Final receipt of a single transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Status of a `wallet_sendCalls` bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallsStatus {
    Pending,
    Success,
    Failure(String),
}

impl CallsStatus {
    /// Parse the `status` field of a `wallet_getCallsStatus` response.
    ///
    /// Accepts both numeric codes (1xx pending, 2xx confirmed, anything else
    /// failed) and the older string form.
    pub fn from_status_value(status: &Value) -> Self {
        match status {
            Value::Number(code) => match code.as_u64() {
                Some(100..=199) => CallsStatus::Pending,
                Some(200..=299) => CallsStatus::Success,
                _ => CallsStatus::Failure(format!("status {}", code)),
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "pending" => CallsStatus::Pending,
                "confirmed" | "success" => CallsStatus::Success,
                other => CallsStatus::Failure(other.to_string()),
            },
            Value::Null => CallsStatus::Pending,
            other => CallsStatus::Failure(other.to_string()),
        }
    }
}

/// Whether the connected wallet can execute calls atomically on a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCapability {
    pub chain_id: Option<u64>,
    pub supports_atomic_batch: bool,
}

impl BatchCapability {
    pub fn unsupported(chain_id: Option<u64>) -> Self {
        Self {
            chain_id,
            supports_atomic_batch: false,
        }
    }
}

/// `wallet_getCapabilities` response, keyed by chain id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletCapabilities {
    chains: HashMap<u64, Value>,
}

fn parse_chain_id(key: &str) -> Option<u64> {
    match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    }
}

impl WalletCapabilities {
    /// Chain ids may be keyed as hex (`"0x2105"`) or decimal strings; unparsable
    /// keys are ignored
    pub fn from_json(value: &Value) -> Self {
        let chains = value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(key, caps)| Some((parse_chain_id(key)?, caps.clone())))
                    .collect()
            })
            .unwrap_or_default();
        Self { chains }
    }

    pub fn supports_atomic_batch(&self, chain_id: u64) -> bool {
        self.chains
            .get(&chain_id)
            .and_then(|caps| caps.pointer("/atomic/status"))
            .and_then(Value::as_str)
            == Some("supported")
    }

    pub fn batch_capability(&self, chain_id: u64) -> BatchCapability {
        BatchCapability {
            chain_id: Some(chain_id),
            supports_atomic_batch: self.supports_atomic_batch(chain_id),
        }
    }
}

/// Signing wallet used to submit writes
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Connected account, if any
    fn account(&self) -> Option<Address>;

    fn chain_id(&self) -> Option<u64>;

    async fn capabilities(&self, account: Address) -> Result<WalletCapabilities, WalletError>;

    async fn send_transaction(&self, call: &ContractCall) -> Result<B256, WalletError>;

    /// Resolves once the transaction is mined
    async fn wait_for_receipt(&self, hash: B256) -> Result<ReceiptOutcome, WalletError>;

    /// Submit calls as one atomic bundle, returning the bundle id
    async fn send_calls(&self, calls: &[ContractCall]) -> Result<String, WalletError>;

    async fn calls_status(&self, id: &str) -> Result<CallsStatus, WalletError>;
}

/// Ask the wallet whether it can batch on its active chain; any missing data
/// or error means no
pub async fn detect_batch_capability<W>(wallet: &W) -> BatchCapability
where
    W: Wallet + ?Sized,
{
    let chain_id = wallet.chain_id();
    let (Some(account), Some(chain)) = (wallet.account(), chain_id) else {
        return BatchCapability::unsupported(chain_id);
    };

    match wallet.capabilities(account).await {
        Ok(caps) => caps.batch_capability(chain),
        Err(e) => {
            tracing::debug!("Capability lookup failed, assuming no batching: {}", e);
            BatchCapability::unsupported(chain_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capabilities_hex_and_decimal_keys() {
        let caps = WalletCapabilities::from_json(&json!({
            "0x2105": { "atomic": { "status": "supported" } },
            "10": { "atomic": { "status": "supported" } },
            "0x1": { "atomic": { "status": "ready" } },
            "bogus": { "atomic": { "status": "supported" } },
        }));

        assert!(caps.supports_atomic_batch(8453));
        assert!(caps.supports_atomic_batch(10));
        assert!(!caps.supports_atomic_batch(1));
        assert!(!caps.supports_atomic_batch(137));
    }

    #[test]
    fn test_capabilities_missing_data_means_unsupported() {
        assert!(!WalletCapabilities::from_json(&Value::Null).supports_atomic_batch(1));
        let caps = WalletCapabilities::from_json(&json!({ "0x1": {} }));
        assert_eq!(caps.batch_capability(1), BatchCapability::unsupported(Some(1)));
    }

    #[test]
    fn test_calls_status_parsing() {
        assert_eq!(CallsStatus::from_status_value(&json!(100)), CallsStatus::Pending);
        assert_eq!(CallsStatus::from_status_value(&json!(200)), CallsStatus::Success);
        assert!(matches!(
            CallsStatus::from_status_value(&json!(500)),
            CallsStatus::Failure(_)
        ));
        assert_eq!(CallsStatus::from_status_value(&json!("PENDING")), CallsStatus::Pending);
        assert_eq!(CallsStatus::from_status_value(&json!("CONFIRMED")), CallsStatus::Success);
        assert_eq!(CallsStatus::from_status_value(&json!("success")), CallsStatus::Success);
        assert_eq!(
            CallsStatus::from_status_value(&json!("failure")),
            CallsStatus::Failure("failure".to_string())
        );
    }
}
