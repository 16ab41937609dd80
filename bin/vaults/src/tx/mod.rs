pub mod actions;
pub mod allowance;
pub mod errors;
pub mod executor;
pub mod intent;
pub mod notify;
pub mod poll;
pub mod signer_wallet;
pub mod simulated;
pub mod state;
pub mod wallet;

pub use actions::{amount_for_fraction, deposit_intent, withdraw_intent, VaultTarget};
pub use allowance::{
    decide_approval, AllowanceGatedWrite, AllowanceSnapshot, ApprovalDecision, ExecutionPlan,
    GatedOutcome, PreparedWrite,
};
pub use errors::{TxError, WalletError};
pub use executor::WriteExecutor;
pub use intent::{
    AllowanceRequirement, ContractCall, DisableCondition, ToastMessages, WriteIntent,
    WriteIntentBuilder, WriteTarget,
};
pub use notify::{Notification, Notifier, RecordingNotifier, TracingNotifier, TX_MINING, TX_SUBMITTING};
pub use poll::{PollPolicy, PollStep};
pub use signer_wallet::SignerWallet;
pub use simulated::{SentRequest, SimulatedWallet};
pub use state::{TransactionState, TxId};
pub use wallet::{
    detect_batch_capability, BatchCapability, CallsStatus, ReceiptOutcome, Wallet,
    WalletCapabilities,
};
