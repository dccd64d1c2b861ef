//! Capabilities supplied by the host application: the connected wallet that
//! signs, and the user who approves destructive actions.

use async_trait::async_trait;

use crate::blockchain::{Address, Amount};
use crate::errors::WalletResult;

/// A connected wallet able to sign transaction messages.
///
/// Key custody stays with the implementor; the crate only ever hands over
/// serialized message bytes.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// `None` while no wallet is connected.
    fn public_key(&self) -> Option<Address>;

    /// Ed25519 signature over `message`. A user rejection should be reported
    /// as `WalletError::TransactionError`.
    async fn sign_message(&self, message: &[u8]) -> WalletResult<[u8; 64]>;
}

/// What the user is being asked to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationRequest {
    DeleteCustomRpc { name: String },
    CloseAccounts { count: usize, reclaimable: Amount },
}

impl ConfirmationRequest {
    pub fn prompt(&self) -> String {
        match self {
            ConfirmationRequest::DeleteCustomRpc { name } => {
                format!("Are you sure you want to delete \"{}\"?", name)
            }
            ConfirmationRequest::CloseAccounts { count, reclaimable } => format!(
                "Close {} account(s) and reclaim about {} SOL?",
                count,
                reclaimable.to_fixed(6)
            ),
        }
    }
}

/// Asks the user before a destructive action runs.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Approves everything; for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

#[async_trait]
impl Confirmer for AlwaysConfirm {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        log::debug!("Auto-confirming: {}", request.prompt());
        true
    }
}
