use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::api::types::ParsedTransaction;
use crate::blockchain::{Address, Amount};
use crate::blockchain_client::ChainRpc;
use crate::errors::WalletResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Incoming,
    Outgoing,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub direction: TransactionDirection,
    pub amount: Option<Amount>,
    pub counterparty: Option<String>,
    pub failed: bool,
}

/// Recent activity for an address, newest first.
pub struct HistoryFetcher {
    rpc: Arc<dyn ChainRpc>,
    limit: usize,
}

impl HistoryFetcher {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn new(rpc: Arc<dyn ChainRpc>, limit: usize) -> Self {
        Self {
            rpc,
            limit: limit.max(1),
        }
    }

    /// Signatures without a block time or whose transaction the node no
    /// longer has are left out.
    pub async fn fetch(&self, owner: &Address) -> WalletResult<Vec<HistoryEntry>> {
        let signatures = self
            .rpc
            .get_signatures_for_address(owner, self.limit)
            .await?;
        if signatures.is_empty() {
            return Ok(Vec::new());
        }

        let details = join_all(
            signatures
                .iter()
                .map(|info| self.rpc.get_parsed_transaction(&info.signature)),
        )
        .await;

        let owner_str = owner.as_string();
        let mut entries = Vec::with_capacity(signatures.len());
        for (info, detail) in signatures.into_iter().zip(details) {
            let transaction = match detail {
                Ok(Some(tx)) => tx,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Skipping {}: {}", info.signature, err);
                    continue;
                }
            };
            let Some(timestamp) = info
                .block_time
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            else {
                continue;
            };

            let (direction, amount, counterparty) = classify(&transaction, &owner_str);
            entries.push(HistoryEntry {
                signature: info.signature,
                timestamp,
                direction,
                amount,
                counterparty,
                failed: info.err.is_some(),
            });
        }
        Ok(entries)
    }
}

/// Direction from the first parsed transfer that touches `owner`.
fn classify(
    transaction: &ParsedTransaction,
    owner: &str,
) -> (TransactionDirection, Option<Amount>, Option<String>) {
    for instruction in &transaction.transaction.message.instructions {
        let Some(transfer) = instruction.as_transfer() else {
            continue;
        };
        let amount = Some(Amount::from_lamports(transfer.lamports));
        if transfer.source == owner {
            return (TransactionDirection::Outgoing, amount, Some(transfer.destination));
        }
        if transfer.destination == owner {
            return (TransactionDirection::Incoming, amount, Some(transfer.source));
        }
    }
    (TransactionDirection::Other, None, None)
}
