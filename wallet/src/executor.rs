//! Sequential batch execution.
//!
//! A batch is an ordered list of independent transactions, one per item.
//! Items run strictly one after another; a failing item is recorded and the
//! run moves on to the next one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::types::{BlockhashInfo, Commitment};
use crate::blockchain_client::ChainRpc;
use crate::errors::{WalletError, WalletResult};
use crate::settings::WalletSettings;

/// Build, sign, submit and confirm the transaction for one item.
#[async_trait]
pub trait TransactionStep<T: Sync>: Send + Sync {
    /// Returns the confirmed transaction signature.
    async fn execute(&self, index: usize, item: &T) -> WalletResult<String>;
}

/// Running counters of a batch. `completed_count == total_count` once every
/// item has been attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub completed_count: usize,
    pub total_count: usize,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total_count
    }

    fn record(&mut self, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.completed_count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    /// Position of the item in the input list.
    pub index: usize,
    pub signature: Option<String>,
    pub error: Option<WalletError>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.signature.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    Cancelled,
    NetworkFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: Uuid,
    pub result: BatchResult,
    pub items: Vec<ItemOutcome>,
    /// Set when the run ended before every item was attempted.
    pub stopped_early: Option<StopReason>,
}

impl BatchReport {
    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| item.signature.as_deref())
    }
}

/// Optional behaviour on top of run-to-completion. Both are off by default.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Checked before each item; once cancelled no further items start.
    pub cancel: Option<CancellationToken>,
    /// Stop after the first transport-level failure instead of continuing.
    pub fail_fast_on_network: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SequentialExecutor {
    options: ExecutorOptions,
}

impl SequentialExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// Run `step` over `items` in order. `progress` is called after each
    /// attempted item with the updated counters; never for an empty batch.
    pub async fn run<T, S, P>(&self, items: &[T], step: &S, mut progress: P) -> BatchReport
    where
        T: Sync,
        S: TransactionStep<T> + ?Sized,
        P: FnMut(&BatchResult) + Send,
    {
        let run_id = Uuid::new_v4();
        let mut result = BatchResult {
            total_count: items.len(),
            ..BatchResult::default()
        };
        let mut outcomes = Vec::with_capacity(items.len());
        let mut stopped_early = None;

        if items.is_empty() {
            log::debug!("batch {}: nothing to execute", run_id);
            return BatchReport {
                run_id,
                result,
                items: outcomes,
                stopped_early,
            };
        }

        log::info!("batch {}: executing {} transaction(s)", run_id, items.len());

        for (index, item) in items.iter().enumerate() {
            if self.is_cancelled() {
                log::info!(
                    "batch {}: cancelled before item {} of {}",
                    run_id,
                    index + 1,
                    items.len()
                );
                stopped_early = Some(StopReason::Cancelled);
                break;
            }

            let outcome = match step.execute(index, item).await {
                Ok(signature) => {
                    log::info!("batch {}: item {} confirmed ({})", run_id, index + 1, signature);
                    ItemOutcome {
                        index,
                        signature: Some(signature),
                        error: None,
                    }
                }
                Err(err) => {
                    log::warn!("batch {}: item {} failed: {}", run_id, index + 1, err);
                    ItemOutcome {
                        index,
                        signature: None,
                        error: Some(err),
                    }
                }
            };

            result.record(outcome.is_success());
            let network_failure = outcome.error.as_ref().is_some_and(WalletError::is_network);
            outcomes.push(outcome);
            progress(&result);

            if network_failure && self.options.fail_fast_on_network && index + 1 < items.len() {
                log::warn!(
                    "batch {}: stopping after network failure, {} item(s) not attempted",
                    run_id,
                    items.len() - index - 1
                );
                stopped_early = Some(StopReason::NetworkFailure);
                break;
            }
        }

        log::info!(
            "batch {}: {} succeeded, {} failed, {} of {} attempted",
            run_id,
            result.success_count,
            result.failed_count,
            result.completed_count,
            result.total_count
        );

        BatchReport {
            run_id,
            result,
            items: outcomes,
            stopped_early,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// How long and how hard to wait for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub commitment: Commitment,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl ConfirmOptions {
    pub fn from_settings(settings: &WalletSettings) -> WalletResult<Self> {
        Ok(Self {
            commitment: settings.commitment()?,
            timeout: settings.confirm_timeout()?,
            poll_interval: settings.confirm_poll_interval()?,
        })
    }
}

/// Poll until `signature` reaches the requested commitment.
///
/// Fails with `TransactionError` when the chain reports an execution error
/// or the blockhash validity window closes first, and with
/// `ConfirmationTimeout` when `options.timeout` elapses.
pub async fn await_confirmation(
    rpc: &dyn ChainRpc,
    signature: &str,
    blockhash: &BlockhashInfo,
    options: &ConfirmOptions,
) -> WalletResult<()> {
    let polling = async {
        loop {
            match rpc.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        return Err(WalletError::TransactionError(format!(
                            "Transaction {} failed: {}",
                            signature, err
                        )));
                    }
                    if options.commitment.is_reached_by(status.reached()) {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    if blockhash_expired(rpc, blockhash).await {
                        return Err(WalletError::TransactionError(format!(
                            "Blockhash expired before {} was confirmed",
                            signature
                        )));
                    }
                }
                Err(err) => {
                    log::debug!("status poll for {} failed: {}", signature, err);
                }
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    };

    match tokio::time::timeout(options.timeout, polling).await {
        Ok(result) => result,
        Err(_) => Err(WalletError::ConfirmationTimeout(signature.to_string())),
    }
}

async fn blockhash_expired(rpc: &dyn ChainRpc, blockhash: &BlockhashInfo) -> bool {
    match rpc.get_block_height().await {
        Ok(height) => height > blockhash.last_valid_block_height,
        Err(err) => {
            log::debug!("block height query failed: {}", err);
            false
        }
    }
}
