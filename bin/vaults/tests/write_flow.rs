use alloy_primitives::{Address, U256};
use chrono::Utc;
use common::units::parse_units;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vaults::cache::{CacheTtl, UnifiedCache};
use vaults::chain::{ChainReader, SimulatedChainReader, SimulatedVault, TokenDetails};
use vaults::queries;
use vaults::tx::intent::ErrorCallback;
use vaults::tx::{
    deposit_intent, AllowanceGatedWrite, AllowanceRequirement, ContractCall, ExecutionPlan,
    PollPolicy, RecordingNotifier, SentRequest, SimulatedWallet, TransactionState, TxError, TxId,
    VaultTarget, WriteExecutor, WriteIntent, WriteTarget,
};

const CHAIN_ID: u64 = 8453;
const ACCOUNT: Address = Address::repeat_byte(0xee);
const VAULT: Address = Address::repeat_byte(0xa1);
const LP: Address = Address::repeat_byte(0x10);
const SYND: Address = Address::repeat_byte(0x11);
const WETH: Address = Address::repeat_byte(0x12);

type Gate = AllowanceGatedWrite<SimulatedWallet, RecordingNotifier, SimulatedChainReader>;

struct Fixture {
    chain: Arc<SimulatedChainReader>,
    wallet: Arc<SimulatedWallet>,
    notifier: Arc<RecordingNotifier>,
    cache: Arc<UnifiedCache<SimulatedChainReader>>,
    gate: Gate,
}

fn units(s: &str) -> U256 {
    parse_units(s, 18).unwrap()
}

fn token(address: Address, symbol: &str) -> TokenDetails {
    TokenDetails {
        address,
        name: symbol.to_string(),
        symbol: symbol.to_string(),
        decimals: 18,
    }
}

fn fixture(wallet: SimulatedWallet) -> Fixture {
    build_fixture(wallet, true)
}

/// `wired = false` leaves confirmed approvals invisible to allowance reads
fn build_fixture(wallet: SimulatedWallet, wired: bool) -> Fixture {
    let chain = Arc::new(SimulatedChainReader::new());
    chain.add_vault(
        VAULT,
        SimulatedVault::new("aerodrome-SYND-WETH", Address::repeat_byte(0x5), [LP, SYND, WETH])
            .with_valuation(units("10"), units("2")),
    );
    chain.add_token(token(LP, "vAMM-SYND/WETH"));
    chain.add_token(token(SYND, "SYND"));
    chain.add_token(token(WETH, "WETH"));
    chain.set_balance(LP, ACCOUNT, units("5"));

    let wallet = Arc::new(if wired {
        wallet.with_chain(chain.clone())
    } else {
        wallet
    });
    let notifier = Arc::new(RecordingNotifier::new());
    let cache = Arc::new(UnifiedCache::new(chain.clone(), CacheTtl::default()));

    let executor = Arc::new(
        WriteExecutor::new(wallet.clone(), notifier.clone(), PollPolicy::default())
            .with_refresher(cache.clone()),
    );
    let gate = AllowanceGatedWrite::new(executor, chain.clone());

    Fixture {
        chain,
        wallet,
        notifier,
        cache,
        gate,
    }
}

async fn target(fixture: &Fixture) -> VaultTarget {
    let snapshot = fixture.cache.get().await.unwrap();
    let detail = queries::vault_detail(&snapshot, fixture.chain.as_ref(), "aerodrome-synd-weth", Utc::now())
        .await
        .unwrap()
        .unwrap();
    VaultTarget::from_detail(&detail)
}

#[tokio::test(start_paused = true)]
async fn test_unbatched_approve_then_deposit() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID));
    let vault = target(&fixture).await;
    let mut refreshed = fixture.cache.subscribe();

    let intent = deposit_intent(&vault, "1.5", units("5")).unwrap();
    assert_eq!(fixture.gate.prepare(&intent).await.label, "Approve SYND/WETH LP & Deposit");

    let outcome = fixture.gate.execute(&intent).await.unwrap();

    assert_eq!(outcome.plan, ExecutionPlan::ApproveThenCall { amount: units("1.5") });
    assert!(matches!(outcome.approval, Some(TxId::Hash(_))));
    assert!(matches!(outcome.main, TxId::Hash(_)));

    let sent = fixture.wallet.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[0],
        SentRequest::Transaction(ContractCall::approve(LP, VAULT, units("1.5")))
    );
    match &sent[1] {
        SentRequest::Transaction(call) => {
            assert_eq!(call.to, VAULT);
            assert_eq!(call.function, "deposit(uint256)");
        }
        other => panic!("expected a deposit transaction, got {:?}", other),
    }

    let allowance = fixture.chain.allowance(LP, ACCOUNT, VAULT).await.unwrap();
    assert_eq!(allowance, units("1.5"));
    assert_eq!(
        fixture.gate.allowance_snapshot().map(|s| s.amount),
        Some(units("1.5"))
    );

    assert_eq!(
        fixture.notifier.successes(),
        vec![
            "SYND/WETH LP approved successfully!".to_string(),
            "Successfully deposited SYND/WETH LP into SYND/WETH!".to_string(),
        ]
    );
    assert!(fixture.notifier.active_loading().is_empty());

    // Only the deposit triggers a refresh
    assert!(refreshed.has_changed().unwrap());
    assert_eq!(*refreshed.borrow_and_update(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batched_approve_and_deposit() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID).with_atomic_batching());
    let vault = target(&fixture).await;

    let intent = deposit_intent(&vault, "2", units("5")).unwrap();
    assert_eq!(
        fixture.gate.prepare(&intent).await.label,
        "Approve SYND/WETH LP & Deposit (Batched)"
    );

    let outcome = fixture.gate.execute(&intent).await.unwrap();
    assert_eq!(outcome.plan, ExecutionPlan::AtomicBatch { amount: units("2") });
    assert_eq!(outcome.approval, None);
    assert!(matches!(outcome.main, TxId::Calls(_)));

    let sent = fixture.wallet.sent();
    assert_eq!(sent.len(), 1);
    let SentRequest::Calls(calls) = &sent[0] else {
        panic!("expected one batch, got {:?}", sent);
    };
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], ContractCall::approve(LP, VAULT, units("2")));
    assert_eq!(calls[1].to, VAULT);

    assert_eq!(
        fixture.notifier.loading_messages()[0],
        "Confirm SYND/WETH LP approval & transaction in wallet..."
    );
    assert_eq!(
        fixture.notifier.successes(),
        vec!["Transaction completed successfully!".to_string()]
    );
    assert_eq!(fixture.chain.allowance(LP, ACCOUNT, VAULT).await.unwrap(), units("2"));
}

#[tokio::test(start_paused = true)]
async fn test_sufficient_allowance_goes_direct() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID).with_atomic_batching());
    fixture.chain.set_allowance(LP, ACCOUNT, VAULT, units("100"));
    let vault = target(&fixture).await;

    let intent = deposit_intent(&vault, "1", units("5")).unwrap();
    let outcome = fixture.gate.execute(&intent).await.unwrap();

    assert_eq!(outcome.plan, ExecutionPlan::Direct);
    let sent = fixture.wallet.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], SentRequest::Transaction(call) if call.to == VAULT));
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_amount_never_reaches_wallet() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID));

    let intent = WriteIntent::builder()
        .target(WriteTarget::Single(ContractCall::approve(SYND, VAULT, U256::ZERO)))
        .allowance(AllowanceRequirement {
            token: LP,
            decimals: 18,
            symbol: "LP".to_string(),
            spender: VAULT,
            required_amount: "1.2.3".to_string(),
        })
        .build()
        .unwrap();

    let prepared = fixture.gate.prepare(&intent).await;
    assert!(!prepared.decision.needs_approval);
    assert!(prepared.decision.parse_error.is_some());

    let err = fixture.gate.execute(&intent).await.unwrap_err();
    assert_eq!(err, TxError::Disabled("Invalid LP amount".to_string()));
    assert!(fixture.wallet.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deposit_blocked_by_balance() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID));
    let vault = target(&fixture).await;

    let intent = deposit_intent(&vault, "6", units("5")).unwrap();
    let err = fixture.gate.execute(&intent).await.unwrap_err();

    assert_eq!(
        err,
        TxError::Disabled("Insufficient SYND/WETH LP balance".to_string())
    );
    assert!(fixture.wallet.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_approval_stops_before_deposit() {
    let fixture = fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID));
    let vault = target(&fixture).await;
    fixture.wallet.reject_next();

    let intent = deposit_intent(&vault, "1", units("5")).unwrap();
    let err = fixture.gate.execute(&intent).await.unwrap_err();

    assert!(matches!(err, TxError::Rejected(_)));
    assert!(fixture.wallet.sent().is_empty());
    assert_eq!(
        fixture.notifier.errors(),
        vec!["Failed to approve SYND/WETH LP".to_string()]
    );
    assert_eq!(fixture.chain.allowance(LP, ACCOUNT, VAULT).await.unwrap(), U256::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_allowance_that_never_settles_reports_failure() {
    let fixture = build_fixture(SimulatedWallet::new(ACCOUNT, CHAIN_ID), false);
    let vault = target(&fixture).await;

    let error_calls = Arc::new(AtomicUsize::new(0));
    let mut intent = deposit_intent(&vault, "1", units("5")).unwrap();
    let on_error: ErrorCallback = {
        let error_calls = error_calls.clone();
        Arc::new(move |_: &TxError| {
            error_calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    intent.on_error = Some(on_error);

    let err = fixture.gate.execute(&intent).await.unwrap_err();

    assert_eq!(err, TxError::AllowanceNotUpdated { token: LP });
    assert_eq!(fixture.wallet.sent().len(), 1);
    assert_eq!(
        fixture.notifier.successes(),
        vec!["SYND/WETH LP approved successfully!".to_string()]
    );
    assert_eq!(
        fixture.notifier.errors(),
        vec!["Failed to deposit SYND/WETH LP into SYND/WETH.".to_string()]
    );
    assert_eq!(error_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        fixture.gate.executor().state(),
        TransactionState::Failed(_)
    ));
    assert!(!fixture.gate.executor().is_busy());
    assert_eq!(
        fixture.gate.allowance_snapshot().map(|s| s.amount),
        Some(U256::ZERO)
    );
}
