//! Allowance gating in front of the write executor.
//!
//! When the main call needs an ERC-20 allowance the gate either bundles
//! `approve` and the main call into one atomic batch, or, for wallets that
//! cannot batch, confirms the approval first and then submits the main call.

use super::errors::TxError;
use super::executor::WriteExecutor;
use super::intent::{
    AllowanceRequirement, ContractCall, DisableCondition, ToastMessages, WriteIntent, WriteTarget,
};
use super::notify::Notifier;
use super::poll::{PollPolicy, PollStep};
use super::state::TxId;
use super::wallet::{detect_batch_capability, BatchCapability, Wallet};
use crate::chain::ChainReader;
use alloy_primitives::{Address, U256};
use common::units::{parse_units, UnitsError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on waiting for a confirmed approval to show up in reads
const ALLOWANCE_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceSnapshot {
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub needs_approval: bool,
    /// Required amount in base units, when it parsed
    pub required: Option<U256>,
    pub parse_error: Option<UnitsError>,
}

/// Compare the current allowance against the human readable required amount.
///
/// Unparsable and zero amounts never need approval.
pub fn decide_approval(current: U256, required_amount: &str, decimals: u8) -> ApprovalDecision {
    match parse_units(required_amount, decimals) {
        Ok(required) => ApprovalDecision {
            needs_approval: !required.is_zero() && current < required,
            required: Some(required),
            parse_error: None,
        },
        Err(e) => ApprovalDecision {
            needs_approval: false,
            required: None,
            parse_error: Some(e),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Submit the main call as is
    Direct,
    /// Confirm `approve(amount)` first, then submit the main call
    ApproveThenCall { amount: U256 },
    /// `[approve(amount), main call]` as one atomic batch
    AtomicBatch { amount: U256 },
}

impl ExecutionPlan {
    pub fn choose(decision: &ApprovalDecision, batch: &BatchCapability) -> Self {
        match (decision.needs_approval, decision.required) {
            (true, Some(amount)) if batch.supports_atomic_batch => {
                ExecutionPlan::AtomicBatch { amount }
            }
            (true, Some(amount)) => ExecutionPlan::ApproveThenCall { amount },
            _ => ExecutionPlan::Direct,
        }
    }

    pub fn action_label(&self, symbol: &str, label: &str) -> String {
        match self {
            ExecutionPlan::AtomicBatch { .. } => {
                format!("Approve {} & {} (Batched)", symbol, label)
            }
            ExecutionPlan::ApproveThenCall { .. } => format!("Approve {} & {}", symbol, label),
            ExecutionPlan::Direct => label.to_string(),
        }
    }
}

/// What the gate would do for an intent right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWrite {
    pub allowance: Option<AllowanceSnapshot>,
    pub decision: ApprovalDecision,
    pub batch: BatchCapability,
    pub plan: ExecutionPlan,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedOutcome {
    pub plan: ExecutionPlan,
    pub approval: Option<TxId>,
    pub main: TxId,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AllowanceGatedWrite<W: ?Sized, N: ?Sized, R: ?Sized> {
    executor: Arc<WriteExecutor<W, N>>,
    reader: Arc<R>,
    busy: AtomicBool,
    last_allowance: Mutex<Option<AllowanceSnapshot>>,
}

impl<W, N, R> AllowanceGatedWrite<W, N, R>
where
    W: Wallet + ?Sized,
    N: Notifier + ?Sized,
    R: ChainReader + ?Sized,
{
    pub fn new(executor: Arc<WriteExecutor<W, N>>, reader: Arc<R>) -> Self {
        Self {
            executor,
            reader,
            busy: AtomicBool::new(false),
            last_allowance: Mutex::new(None),
        }
    }

    pub fn executor(&self) -> &Arc<WriteExecutor<W, N>> {
        &self.executor
    }

    /// Allowance as of the last read
    pub fn allowance_snapshot(&self) -> Option<AllowanceSnapshot> {
        self.last_allowance.lock().clone()
    }

    /// Read the current allowance; `None` when owner or spender is unknown
    pub async fn refresh_allowance(
        &self,
        requirement: &AllowanceRequirement,
    ) -> Option<AllowanceSnapshot> {
        let owner = self.executor.wallet().account()?;
        if requirement.spender.is_zero() {
            return None;
        }

        let amount = match self
            .reader
            .allowance(requirement.token, owner, requirement.spender)
            .await
        {
            Ok(amount) => amount,
            Err(e) => {
                tracing::warn!("Failed to read {} allowance, assuming zero: {}", requirement.symbol, e);
                U256::ZERO
            }
        };

        let snapshot = AllowanceSnapshot {
            owner,
            spender: requirement.spender,
            token: requirement.token,
            amount,
        };
        *self.last_allowance.lock() = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Read allowance and batch capability and pick a plan
    pub async fn prepare(&self, intent: &WriteIntent) -> PreparedWrite {
        let batch = detect_batch_capability(self.executor.wallet().as_ref()).await;

        let Some(requirement) = &intent.allowance else {
            return PreparedWrite {
                allowance: None,
                decision: ApprovalDecision {
                    needs_approval: false,
                    required: None,
                    parse_error: None,
                },
                batch,
                plan: ExecutionPlan::Direct,
                label: intent.label.clone(),
            };
        };

        let allowance = self.refresh_allowance(requirement).await;
        let decision = match &allowance {
            Some(snapshot) => decide_approval(
                snapshot.amount,
                &requirement.required_amount,
                requirement.decimals,
            ),
            None => ApprovalDecision {
                needs_approval: false,
                ..decide_approval(U256::MAX, &requirement.required_amount, requirement.decimals)
            },
        };
        let plan = ExecutionPlan::choose(&decision, &batch);

        PreparedWrite {
            label: plan.action_label(&requirement.symbol, &intent.label),
            allowance,
            decision,
            batch,
            plan,
        }
    }

    /// Run the intent, inserting an approval when the allowance is short
    pub async fn execute(&self, intent: &WriteIntent) -> Result<GatedOutcome, TxError> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(TxError::AlreadyInFlight)?;

        let prepared = self.prepare(intent).await;
        let Some(requirement) = intent.allowance.clone() else {
            let main = self.executor.submit(intent).await?;
            return Ok(GatedOutcome {
                plan: ExecutionPlan::Direct,
                approval: None,
                main,
            });
        };

        let mut gated = intent.clone();
        if let Some(e) = &prepared.decision.parse_error {
            tracing::debug!("Unparsable {} amount: {}", requirement.symbol, e);
            gated.disable_conditions.push(DisableCondition::new(
                true,
                format!("Invalid {} amount", requirement.symbol),
            ));
        }

        tracing::info!("{} ({:?})", prepared.label, prepared.plan);

        let outcome = match prepared.plan {
            ExecutionPlan::Direct => GatedOutcome {
                plan: prepared.plan,
                approval: None,
                main: self.executor.submit(&gated).await?,
            },
            ExecutionPlan::AtomicBatch { amount } => {
                let mut calls = vec![ContractCall::approve(
                    requirement.token,
                    requirement.spender,
                    amount,
                )];
                calls.extend_from_slice(gated.target.calls());

                let batched = WriteIntent {
                    target: WriteTarget::Batched(calls),
                    messages: ToastMessages::batched(&requirement.symbol),
                    label: prepared.label.clone(),
                    ..gated
                };
                GatedOutcome {
                    plan: prepared.plan,
                    approval: None,
                    main: self.executor.submit(&batched).await?,
                }
            }
            ExecutionPlan::ApproveThenCall { amount } => {
                let approval = WriteIntent {
                    target: WriteTarget::Single(ContractCall::approve(
                        requirement.token,
                        requirement.spender,
                        amount,
                    )),
                    allowance: None,
                    messages: ToastMessages::approval(&requirement.symbol),
                    label: format!("Approve {}", requirement.symbol),
                    invalidate_on_success: false,
                    on_success: None,
                    on_refresh: None,
                    ..gated.clone()
                };

                let approval_id = self.executor.submit(&approval).await?;
                if let Err(err) = self.await_allowance(&requirement, amount).await {
                    // Approval already reported success; the failure belongs to the main intent
                    self.executor.failed(&gated, &err);
                    return Err(err);
                }

                GatedOutcome {
                    plan: prepared.plan,
                    approval: Some(approval_id),
                    main: self.executor.submit(&gated).await?,
                }
            }
        };

        self.refresh_allowance(&requirement).await;
        Ok(outcome)
    }

    /// Re-read the allowance until it covers `amount`
    async fn await_allowance(
        &self,
        requirement: &AllowanceRequirement,
        amount: U256,
    ) -> Result<(), TxError> {
        let base = self.executor.poll_policy();
        let policy = PollPolicy {
            max_wait: base.max_wait.min(ALLOWANCE_SETTLE_TIMEOUT),
            ..base
        };

        policy
            .poll(|| async {
                match self.refresh_allowance(requirement).await {
                    Some(snapshot) if snapshot.amount >= amount => PollStep::Ready(()),
                    _ => PollStep::Pending,
                }
            })
            .await
            .map_err(|waited| {
                tracing::warn!(
                    "{} allowance still below {} after {:?}",
                    requirement.symbol,
                    amount,
                    waited
                );
                TxError::AllowanceNotUpdated {
                    token: requirement.token,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batching(supported: bool) -> BatchCapability {
        BatchCapability {
            chain_id: Some(8453),
            supports_atomic_batch: supported,
        }
    }

    #[test]
    fn test_decide_approval() {
        let ten = U256::from(10_000_000u64);
        assert!(decide_approval(U256::ZERO, "10", 6).needs_approval);
        assert!(decide_approval(U256::from(9_999_999u64), "10", 6).needs_approval);
        assert!(!decide_approval(ten, "10", 6).needs_approval);
        assert!(!decide_approval(U256::from(20_000_000u64), "10", 6).needs_approval);
        assert_eq!(decide_approval(U256::ZERO, "10", 6).required, Some(ten));
    }

    #[test]
    fn test_unparsable_or_zero_amount_needs_no_approval() {
        let garbage = decide_approval(U256::ZERO, "abc", 18);
        assert!(!garbage.needs_approval);
        assert_eq!(garbage.parse_error, Some(UnitsError::InvalidCharacter('a')));

        let empty = decide_approval(U256::ZERO, "", 18);
        assert!(!empty.needs_approval);

        let zero = decide_approval(U256::ZERO, "0.0", 18);
        assert!(!zero.needs_approval);
        assert_eq!(zero.parse_error, None);
    }

    #[test]
    fn test_plan_selection() {
        let needs = decide_approval(U256::ZERO, "1", 18);
        let covered = decide_approval(U256::MAX, "1", 18);
        let amount = U256::from(10u64).pow(U256::from(18u64));

        assert_eq!(
            ExecutionPlan::choose(&needs, &batching(true)),
            ExecutionPlan::AtomicBatch { amount }
        );
        assert_eq!(
            ExecutionPlan::choose(&needs, &batching(false)),
            ExecutionPlan::ApproveThenCall { amount }
        );
        assert_eq!(
            ExecutionPlan::choose(&covered, &batching(true)),
            ExecutionPlan::Direct
        );
    }

    #[test]
    fn test_action_labels() {
        let amount = U256::from(1u64);
        assert_eq!(
            ExecutionPlan::AtomicBatch { amount }.action_label("LP", "Deposit"),
            "Approve LP & Deposit (Batched)"
        );
        assert_eq!(
            ExecutionPlan::ApproveThenCall { amount }.action_label("LP", "Deposit"),
            "Approve LP & Deposit"
        );
        assert_eq!(ExecutionPlan::Direct.action_label("LP", "Deposit"), "Deposit");
    }
}
