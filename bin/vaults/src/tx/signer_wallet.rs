//! Wallet backed by a local private key and an HTTP provider.

use super::errors::WalletError;
use super::intent::ContractCall;
use super::wallet::{CallsStatus, ReceiptOutcome, Wallet, WalletCapabilities};
use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};

/// JSON-RPC error code for a request the user declined (EIP-1193)
const USER_REJECTED_CODE: &str = "4001";

fn classify(err: impl std::fmt::Display) -> WalletError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains(USER_REJECTED_CODE)
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        WalletError::Rejected(message)
    } else if lower.contains("method not found") || lower.contains("not supported") {
        WalletError::Unsupported(message)
    } else {
        WalletError::Rpc(message)
    }
}

pub struct SignerWallet<P> {
    provider: P,
    account: Address,
    chain_id: u64,
}

impl SignerWallet<DynProvider> {
    /// Connect to `rpc_url` and sign with `private_key`
    pub async fn connect(rpc_url: &str, private_key: &str) -> eyre::Result<Self> {
        let signer: PrivateKeySigner = private_key.parse()?;
        let account = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url.parse()?)
            .erased();
        let chain_id = provider.get_chain_id().await?;

        tracing::info!("Wallet {} connected on chain {}", account, chain_id);
        Ok(Self::new(provider, account, chain_id))
    }
}

impl<P> SignerWallet<P>
where
    P: Provider,
{
    pub fn new(provider: P, account: Address, chain_id: u64) -> Self {
        Self {
            provider,
            account,
            chain_id,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn signer_address(&self) -> Address {
        self.account
    }
}

#[async_trait]
impl<P> Wallet for SignerWallet<P>
where
    P: Provider + 'static,
{
    fn account(&self) -> Option<Address> {
        Some(self.account)
    }

    fn chain_id(&self) -> Option<u64> {
        Some(self.chain_id)
    }

    async fn capabilities(&self, account: Address) -> Result<WalletCapabilities, WalletError> {
        let value: Value = self
            .provider
            .raw_request("wallet_getCapabilities".into(), (account,))
            .await
            .map_err(classify)?;
        Ok(WalletCapabilities::from_json(&value))
    }

    async fn send_transaction(&self, call: &ContractCall) -> Result<B256, WalletError> {
        let tx = TransactionRequest::default()
            .to(call.to)
            .value(call.value)
            .input(call.data.clone().into());

        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<ReceiptOutcome, WalletError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .get_receipt()
            .await
            .map_err(classify)?;

        Ok(ReceiptOutcome {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }

    async fn send_calls(&self, calls: &[ContractCall]) -> Result<String, WalletError> {
        let calls: Vec<Value> = calls
            .iter()
            .map(|call| {
                json!({
                    "to": call.to,
                    "data": call.data,
                    "value": format!("{:#x}", call.value),
                })
            })
            .collect();

        let params = json!([{
            "version": "2.0.0",
            "chainId": format!("{:#x}", self.chain_id),
            "from": self.account,
            "atomicRequired": true,
            "calls": calls,
        }]);

        let response: Value = self
            .provider
            .raw_request("wallet_sendCalls".into(), params)
            .await
            .map_err(classify)?;

        // Older wallets return the bundle id as a bare string
        match response {
            Value::String(id) => Ok(id),
            other => other
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| WalletError::Rpc(format!("unexpected wallet_sendCalls response: {}", other))),
        }
    }

    async fn calls_status(&self, id: &str) -> Result<CallsStatus, WalletError> {
        let response: Value = self
            .provider
            .raw_request("wallet_getCallsStatus".into(), (id.to_string(),))
            .await
            .map_err(classify)?;

        Ok(CallsStatus::from_status_value(
            response.get("status").unwrap_or(&Value::Null),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rejection() {
        assert!(matches!(
            classify("code 4001: User rejected the request"),
            WalletError::Rejected(_)
        ));
        assert!(matches!(
            classify("the method wallet_sendCalls does not exist/is not available: Method not found"),
            WalletError::Unsupported(_)
        ));
        assert!(matches!(classify("connection refused"), WalletError::Rpc(_)));
    }
}
