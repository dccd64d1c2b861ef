// lib.rs - Core library structure for the wallet toolkit

pub mod accounts;
pub mod api;
pub mod app_state;
pub mod balance;
pub mod blockchain;
pub mod blockchain_client;
pub mod config_store;
pub mod errors;
pub mod executor;
pub mod history;
pub mod network;
pub mod settings;
pub mod storage;
pub mod transaction;
pub mod transfer;
pub mod validation;
pub mod wallet_adapter;

#[cfg(test)]
mod test_support;

// Re-export common types
pub use accounts::{AccountCloseSelector, AccountKind, CloseCandidate, CloseSelection};
pub use api::types::{BlockhashInfo, Commitment, SignatureStatus, TokenAccount};
pub use app_state::{RpcFactory, WalletContext};
pub use balance::{BalancePoller, PollerHandle};
pub use blockchain::{Address, Amount};
pub use blockchain_client::{BlockchainClient, ChainRpc};
pub use config_store::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use errors::{WalletError, WalletResult};
pub use executor::{
    BatchReport, BatchResult, ConfirmOptions, ExecutorOptions, ItemOutcome, SequentialExecutor,
    StopReason, TransactionStep,
};
pub use history::{HistoryEntry, HistoryFetcher, TransactionDirection};
pub use network::{CustomRpc, NetworkProfile, NetworkRegistry};
pub use settings::{Environment, WalletSettings};
pub use storage::WalletPaths;
pub use transfer::Submitter;
pub use validation::{IntentValidator, TransferIntent};
pub use wallet_adapter::{AlwaysConfirm, ConfirmationRequest, Confirmer, WalletSigner};
