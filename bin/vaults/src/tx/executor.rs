//! Drives one write from wallet prompt to final receipt.

use super::errors::TxError;
use super::intent::{WriteIntent, WriteTarget, CONNECT_WALLET};
use super::notify::{split_success_message, Notifier, TX_MINING, TX_SUBMITTING};
use super::poll::{PollPolicy, PollStep};
use super::state::{TransactionState, TxId};
use super::wallet::{CallsStatus, Wallet};
use crate::cache::Refresher;
use parking_lot::Mutex;
use std::sync::Arc;

/// Resets the state if a submission future is dropped before it resolves
struct InFlightGuard<'a> {
    state: &'a Mutex<TransactionState>,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if state.is_in_flight() {
                *state = TransactionState::Failed("submission abandoned".to_string());
            }
        }
    }
}

/// Executes write intents one at a time.
///
/// A submission is only accepted while no other submission on the same
/// executor is in flight.
pub struct WriteExecutor<W: ?Sized, N: ?Sized> {
    state: Mutex<TransactionState>,
    poll: PollPolicy,
    refresher: Option<Arc<dyn Refresher>>,
    notifier: Arc<N>,
    wallet: Arc<W>,
}

impl<W, N> WriteExecutor<W, N>
where
    W: Wallet + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(wallet: Arc<W>, notifier: Arc<N>, poll: PollPolicy) -> Self {
        Self {
            state: Mutex::new(TransactionState::Idle),
            poll,
            refresher: None,
            notifier,
            wallet,
        }
    }

    /// Refresh operation run after every confirmed write that asks for it
    pub fn with_refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn state(&self) -> TransactionState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().is_in_flight()
    }

    fn set_state(&self, next: TransactionState) {
        *self.state.lock() = next;
    }

    /// Reason the intent cannot be submitted right now, if any
    pub fn disabled_reason(&self, intent: &WriteIntent) -> Option<String> {
        if self.wallet.account().is_none() {
            return Some(CONNECT_WALLET.to_string());
        }
        intent.disabled_reason().map(str::to_string)
    }

    /// Submit the intent and wait for its final outcome.
    ///
    /// Returns [`TxError::AlreadyInFlight`] without touching the wallet when
    /// another submission is pending.
    pub async fn submit(&self, intent: &WriteIntent) -> Result<TxId, TxError> {
        let connected = self.wallet.account().is_some();
        let disabled = self.disabled_reason(intent);

        {
            let mut state = self.state.lock();
            if state.is_in_flight() {
                tracing::debug!("Ignoring {}: a transaction is already in flight", intent.label);
                return Err(TxError::AlreadyInFlight);
            }
            if disabled.is_none() {
                *state = TransactionState::AwaitingWalletConfirmation;
            }
        }

        if let Some(reason) = disabled {
            self.notifier.error(&reason);
            return Err(if connected {
                TxError::Disabled(reason)
            } else {
                TxError::NoAccount
            });
        }

        let mut guard = InFlightGuard {
            state: &self.state,
            armed: true,
        };

        let result = self.run(intent).await;
        match &result {
            Ok(id) => self.confirmed(intent, id).await,
            Err(err) => self.failed(intent, err),
        }

        guard.armed = false;
        result
    }

    async fn run(&self, intent: &WriteIntent) -> Result<TxId, TxError> {
        let messages = &intent.messages;
        self.notifier
            .loading(messages.submitting(), TX_SUBMITTING, false);

        let id = match &intent.target {
            WriteTarget::Single(call) => {
                tracing::info!("📤 {}: sending {}", intent.label, call);
                TxId::Hash(self.wallet.send_transaction(call).await?)
            }
            WriteTarget::Batched(calls) => {
                tracing::info!("📤 {}: sending batch of {} calls", intent.label, calls.len());
                for call in calls {
                    tracing::debug!("  → {}", call);
                }
                TxId::Calls(self.wallet.send_calls(calls).await?)
            }
        };

        self.notifier.dismiss(TX_SUBMITTING);
        self.set_state(TransactionState::Submitted(id.clone()));
        tracing::info!("{} submitted: {}", intent.label, id);

        self.notifier.loading(messages.mining(), TX_MINING, true);
        self.set_state(TransactionState::Confirming(id.clone()));

        self.wait_for_confirmation(&id).await?;
        Ok(id)
    }

    async fn wait_for_confirmation(&self, id: &TxId) -> Result<(), TxError> {
        match id {
            TxId::Hash(hash) => {
                let receipt = tokio::time::timeout(
                    self.poll.max_wait,
                    self.wallet.wait_for_receipt(*hash),
                )
                .await
                .map_err(|_| TxError::Timeout {
                    id: id.clone(),
                    waited: self.poll.max_wait,
                })??;

                if receipt.success {
                    tracing::debug!("Receipt for {} in block {:?}", hash, receipt.block_number);
                    Ok(())
                } else {
                    Err(TxError::Reverted(id.clone()))
                }
            }
            TxId::Calls(bundle) => {
                let wallet = &self.wallet;
                let outcome = self
                    .poll
                    .poll(|| async move {
                        match wallet.calls_status(bundle).await {
                            Ok(CallsStatus::Pending) => PollStep::Pending,
                            Ok(CallsStatus::Success) => PollStep::Ready(Ok(())),
                            Ok(CallsStatus::Failure(status)) => PollStep::Ready(Err(status)),
                            Err(e) => {
                                tracing::warn!("Failed to fetch status of calls {}: {}", bundle, e);
                                PollStep::Pending
                            }
                        }
                    })
                    .await
                    .map_err(|waited| TxError::Timeout {
                        id: id.clone(),
                        waited,
                    })?;

                outcome.map_err(|status| TxError::BatchFailed {
                    id: bundle.clone(),
                    status,
                })
            }
        }
    }

    async fn confirmed(&self, intent: &WriteIntent, id: &TxId) {
        self.notifier.dismiss(TX_MINING);
        let (title, description) = split_success_message(intent.messages.success());
        self.notifier.success(title, description);
        self.set_state(TransactionState::Confirmed(id.clone()));
        tracing::info!("✓ {} confirmed: {}", intent.label, id);

        if let Some(on_success) = &intent.on_success {
            on_success(id);
        }
        if let Some(on_refresh) = &intent.on_refresh {
            on_refresh();
        }
        if intent.invalidate_on_success {
            if let Some(refresher) = &self.refresher {
                if !refresher.refresh().await {
                    tracing::warn!("Cache refresh after {} did not succeed", id);
                }
            }
        }
    }

    /// Dismiss loading notifications, report `err` once and run `on_error`.
    ///
    /// Also used by callers that detect a failure after `submit` returned.
    pub(crate) fn failed(&self, intent: &WriteIntent, err: &TxError) {
        self.notifier.dismiss(TX_SUBMITTING);
        self.notifier.dismiss(TX_MINING);
        self.notifier.error(&intent.messages.error_for(err));
        self.set_state(TransactionState::Failed(err.to_string()));
        tracing::warn!("{} failed: {}", intent.label, err);

        if let Some(on_error) = &intent.on_error {
            on_error(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::intent::{ContractCall, DEFAULT_SUCCESS};
    use crate::tx::notify::{Notification, RecordingNotifier};
    use crate::tx::simulated::{SentRequest, SimulatedWallet};
    use alloy_primitives::{Address, U256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingRefresher(AtomicUsize);

    #[async_trait]
    impl Refresher for CountingRefresher {
        async fn refresh(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    type Exec = WriteExecutor<SimulatedWallet, RecordingNotifier>;

    fn setup(wallet: SimulatedWallet) -> (Arc<Exec>, Arc<CountingRefresher>) {
        let refresher = Arc::new(CountingRefresher::default());
        let executor = WriteExecutor::new(
            Arc::new(wallet),
            Arc::new(RecordingNotifier::new()),
            PollPolicy::default(),
        )
        .with_refresher(refresher.clone());
        (Arc::new(executor), refresher)
    }

    fn call() -> ContractCall {
        ContractCall::approve(Address::repeat_byte(1), Address::repeat_byte(2), U256::from(1u64))
    }

    fn single() -> WriteIntent {
        WriteIntent::builder()
            .target(WriteTarget::Single(call()))
            .build()
            .unwrap()
    }

    fn wallet() -> SimulatedWallet {
        SimulatedWallet::new(Address::repeat_byte(0xaa), 8453)
    }

    #[tokio::test]
    async fn test_single_write_lifecycle() {
        let (executor, refresher) = setup(wallet());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let intent = WriteIntent::builder()
            .target(WriteTarget::Single(call()))
            .on_success(move |_| o1.lock().push("success"))
            .on_refresh(move || o2.lock().push("refresh"))
            .build()
            .unwrap();

        let id = executor.submit(&intent).await.unwrap();

        assert!(matches!(id, TxId::Hash(_)));
        assert_eq!(executor.state(), TransactionState::Confirmed(id));
        assert_eq!(*order.lock(), vec!["success", "refresh"]);
        assert_eq!(refresher.0.load(Ordering::SeqCst), 1);

        let notifier = executor.notifier();
        assert!(notifier.active_loading().is_empty());
        assert_eq!(notifier.successes(), vec![DEFAULT_SUCCESS.to_string()]);
        assert_eq!(
            notifier.events()[2],
            Notification::Loading {
                id: TX_MINING.to_string(),
                message: "Transaction submitted, waiting for confirmation...".to_string(),
                sticky: true,
            }
        );
    }

    #[tokio::test]
    async fn test_success_message_split_into_title_and_description() {
        let (executor, _) = setup(wallet());
        let mut intent = single();
        intent.messages.success = Some("Deposited|into SYND/WETH".to_string());

        executor.submit(&intent).await.unwrap();

        assert!(executor.notifier().events().contains(&Notification::Success {
            title: "Deposited".to_string(),
            description: Some("into SYND/WETH".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_disconnected_wallet_is_rejected_up_front() {
        let (executor, refresher) = setup(SimulatedWallet::disconnected());

        let err = executor.submit(&single()).await.unwrap_err();

        assert_eq!(err, TxError::NoAccount);
        assert_eq!(executor.notifier().errors(), vec![CONNECT_WALLET.to_string()]);
        assert!(executor.wallet().sent().is_empty());
        assert_eq!(executor.state(), TransactionState::Idle);
        assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disable_condition_blocks_submission() {
        let (executor, _) = setup(wallet());
        let intent = WriteIntent::builder()
            .target(WriteTarget::Single(call()))
            .disabled_when(true, "Enter an amount to deposit")
            .build()
            .unwrap();

        let err = executor.submit(&intent).await.unwrap_err();

        assert_eq!(err, TxError::Disabled("Enter an amount to deposit".to_string()));
        assert!(executor.wallet().sent().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_cleans_up_and_reports() {
        let (executor, refresher) = setup(wallet());
        executor.wallet().reject_next();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen_by_callback = seen.clone();
        let intent = WriteIntent::builder()
            .target(WriteTarget::Single(call()))
            .on_error(move |e| *seen_by_callback.lock() = Some(e.clone()))
            .build()
            .unwrap();

        let err = executor.submit(&intent).await.unwrap_err();

        assert!(matches!(err, TxError::Rejected(_)));
        assert_eq!(*seen.lock(), Some(err.clone()));
        assert!(matches!(executor.state(), TransactionState::Failed(_)));
        assert!(executor.notifier().active_loading().is_empty());
        assert_eq!(executor.notifier().errors(), vec![err.to_string()]);
        assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails() {
        let (executor, _) = setup(wallet());
        executor.wallet().revert_next();
        let mut intent = single();
        intent.messages.error = Some("Deposit failed".to_string());

        let err = executor.submit(&intent).await.unwrap_err();

        assert!(matches!(err, TxError::Reverted(TxId::Hash(_))));
        assert_eq!(executor.notifier().errors(), vec!["Deposit failed".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_polls_until_settled() {
        let (executor, _) = setup(wallet());
        executor.wallet().set_pending_polls(3);
        let intent = WriteIntent::builder()
            .target(WriteTarget::Batched(vec![call(), call()]))
            .build()
            .unwrap();

        let id = executor.submit(&intent).await.unwrap();

        assert!(matches!(id, TxId::Calls(_)));
        assert_eq!(executor.wallet().status_polls(), 4);
        assert!(matches!(executor.wallet().sent()[0], SentRequest::Calls(ref c) if c.len() == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_failure_status() {
        let (executor, _) = setup(wallet());
        executor.wallet().fail_next_batch("status 500");
        let intent = WriteIntent::builder()
            .target(WriteTarget::Batched(vec![call()]))
            .build()
            .unwrap();

        let err = executor.submit(&intent).await.unwrap_err();

        assert!(matches!(err, TxError::BatchFailed { ref status, .. } if status == "status 500"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_wait_times_out() {
        let (executor, _) = setup(wallet());
        executor.wallet().hang_receipts();

        let err = executor.submit(&single()).await.unwrap_err();

        match err {
            TxError::Timeout { id, waited } => {
                assert!(matches!(id, TxId::Hash(_)));
                assert_eq!(waited, PollPolicy::default().max_wait);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(executor.notifier().active_loading().is_empty());
        assert!(!executor.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_double_submission() {
        let (executor, _) = setup(wallet());
        executor.wallet().set_receipt_delay(Duration::from_secs(5));
        let intent = single();

        let first = {
            let executor = executor.clone();
            let intent = intent.clone();
            tokio::spawn(async move { executor.submit(&intent).await })
        };
        while !executor.is_busy() {
            tokio::task::yield_now().await;
        }

        let second = executor.submit(&intent).await;

        assert_eq!(second, Err(TxError::AlreadyInFlight));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(executor.wallet().sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submission_releases_executor() {
        let (executor, refresher) = setup(wallet());
        executor.wallet().hang_receipts();
        let intent = single();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), executor.submit(&intent)).await;

        assert!(abandoned.is_err());
        assert!(!executor.is_busy());
        assert_eq!(
            executor.state(),
            TransactionState::Failed("submission abandoned".to_string())
        );
        assert_eq!(refresher.0.load(Ordering::SeqCst), 0);

        // The executor accepts the next write
        let second = executor.submit(&intent).await.unwrap_err();
        assert!(matches!(second, TxError::Timeout { .. }));
        assert_eq!(executor.wallet().sent().len(), 2);
    }
}
