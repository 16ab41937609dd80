//! In-memory wallet that confirms writes without a chain.

use super::errors::WalletError;
use super::intent::ContractCall;
use super::wallet::{CallsStatus, ReceiptOutcome, Wallet, WalletCapabilities};
use crate::chain::SimulatedChainReader;
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use common::interfaces::erc20::IERC20;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A request the wallet was asked to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentRequest {
    Transaction(ContractCall),
    Calls(Vec<ContractCall>),
}

#[derive(Debug, Default)]
struct Behaviour {
    reject_next: bool,
    revert_next: bool,
    batch_failure: Option<String>,
    pending_polls: usize,
    receipt_delay: Option<Duration>,
    hang_receipts: bool,
}

struct Bundle {
    calls: Vec<ContractCall>,
    remaining_pending: usize,
    failure: Option<String>,
    applied: bool,
}

pub struct SimulatedWallet {
    account: Option<Address>,
    chain_id: Option<u64>,
    capabilities: Mutex<Value>,
    chain: Option<Arc<SimulatedChainReader>>,
    behaviour: Mutex<Behaviour>,
    sent: Mutex<Vec<SentRequest>>,
    transactions: Mutex<HashMap<B256, (ContractCall, bool)>>,
    bundles: Mutex<HashMap<String, Bundle>>,
    nonce: AtomicUsize,
    status_polls: AtomicUsize,
}

impl SimulatedWallet {
    pub fn new(account: Address, chain_id: u64) -> Self {
        Self {
            account: Some(account),
            chain_id: Some(chain_id),
            capabilities: Mutex::new(Value::Null),
            chain: None,
            behaviour: Mutex::new(Behaviour::default()),
            sent: Mutex::new(Vec::new()),
            transactions: Mutex::new(HashMap::new()),
            bundles: Mutex::new(HashMap::new()),
            nonce: AtomicUsize::new(0),
            status_polls: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            account: None,
            chain_id: None,
            ..Self::new(Address::ZERO, 0)
        }
    }

    /// Confirmed `approve` calls update allowances on this chain
    pub fn with_chain(mut self, chain: Arc<SimulatedChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Report atomic batching as supported on the wallet's chain
    pub fn with_atomic_batching(self) -> Self {
        if let Some(chain_id) = self.chain_id {
            let mut caps = serde_json::Map::new();
            caps.insert(
                format!("{:#x}", chain_id),
                json!({ "atomic": { "status": "supported" } }),
            );
            *self.capabilities.lock() = Value::Object(caps);
        }
        self
    }

    pub fn set_capabilities(&self, capabilities: Value) {
        *self.capabilities.lock() = capabilities;
    }

    pub fn reject_next(&self) {
        self.behaviour.lock().reject_next = true;
    }

    pub fn revert_next(&self) {
        self.behaviour.lock().revert_next = true;
    }

    pub fn fail_next_batch(&self, status: impl Into<String>) {
        self.behaviour.lock().batch_failure = Some(status.into());
    }

    /// Bundles report pending this many times before settling
    pub fn set_pending_polls(&self, polls: usize) {
        self.behaviour.lock().pending_polls = polls;
    }

    pub fn set_receipt_delay(&self, delay: Duration) {
        self.behaviour.lock().receipt_delay = Some(delay);
    }

    /// Receipts never arrive
    pub fn hang_receipts(&self) {
        self.behaviour.lock().hang_receipts = true;
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> usize {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn take_rejection(&self) -> Result<(), WalletError> {
        let mut behaviour = self.behaviour.lock();
        if behaviour.reject_next {
            behaviour.reject_next = false;
            return Err(WalletError::Rejected("User denied transaction signature".to_string()));
        }
        Ok(())
    }

    fn apply(&self, calls: &[ContractCall]) {
        let (Some(chain), Some(owner)) = (&self.chain, self.account) else {
            return;
        };
        for call in calls {
            if !call.data.starts_with(&IERC20::approveCall::SELECTOR) {
                continue;
            }
            if let Ok(approve) = IERC20::approveCall::abi_decode(&call.data) {
                chain.set_allowance(call.to, owner, approve.spender, approve.amount);
            }
        }
    }
}

#[async_trait]
impl Wallet for SimulatedWallet {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn capabilities(&self, _account: Address) -> Result<WalletCapabilities, WalletError> {
        Ok(WalletCapabilities::from_json(&self.capabilities.lock()))
    }

    async fn send_transaction(&self, call: &ContractCall) -> Result<B256, WalletError> {
        self.take_rejection()?;
        self.sent.lock().push(SentRequest::Transaction(call.clone()));

        let hash = B256::left_padding_from(&self.next_id().to_be_bytes());
        let success = !std::mem::take(&mut self.behaviour.lock().revert_next);
        self.transactions
            .lock()
            .insert(hash, (call.clone(), success));
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<ReceiptOutcome, WalletError> {
        let (delay, hang) = {
            let behaviour = self.behaviour.lock();
            (behaviour.receipt_delay, behaviour.hang_receipts)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let Some((call, success)) = self.transactions.lock().get(&hash).cloned() else {
            return Err(WalletError::Rpc(format!("unknown transaction {}", hash)));
        };
        if success {
            self.apply(std::slice::from_ref(&call));
        }

        Ok(ReceiptOutcome {
            tx_hash: hash,
            block_number: Some(self.nonce.load(Ordering::SeqCst) as u64),
            success,
        })
    }

    async fn send_calls(&self, calls: &[ContractCall]) -> Result<String, WalletError> {
        self.take_rejection()?;
        self.sent.lock().push(SentRequest::Calls(calls.to_vec()));

        let id = format!("{:#x}", self.next_id());
        let (remaining_pending, failure) = {
            let mut behaviour = self.behaviour.lock();
            (behaviour.pending_polls, behaviour.batch_failure.take())
        };
        self.bundles.lock().insert(
            id.clone(),
            Bundle {
                calls: calls.to_vec(),
                remaining_pending,
                failure,
                applied: false,
            },
        );
        Ok(id)
    }

    async fn calls_status(&self, id: &str) -> Result<CallsStatus, WalletError> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);

        let confirmed_calls = {
            let mut bundles = self.bundles.lock();
            let Some(bundle) = bundles.get_mut(id) else {
                return Err(WalletError::Rpc(format!("unknown bundle {}", id)));
            };
            if bundle.remaining_pending > 0 {
                bundle.remaining_pending -= 1;
                return Ok(CallsStatus::Pending);
            }
            if let Some(failure) = &bundle.failure {
                return Ok(CallsStatus::Failure(failure.clone()));
            }
            if bundle.applied {
                Vec::new()
            } else {
                bundle.applied = true;
                bundle.calls.clone()
            }
        };

        self.apply(&confirmed_calls);
        Ok(CallsStatus::Success)
    }
}
