//! SOL transfers: the build/sign/submit/confirm step shared by every batch,
//! and the send-to-many and single-send operations built on it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::blockchain::Address;
use crate::blockchain_client::ChainRpc;
use crate::errors::{WalletError, WalletResult};
use crate::executor::{
    await_confirmation, BatchReport, BatchResult, ConfirmOptions, SequentialExecutor,
    TransactionStep,
};
use crate::transaction::{decode_blockhash, system_transfer, Instruction, Message, Transaction};
use crate::validation::{IntentValidator, TransferIntent};
use crate::wallet_adapter::WalletSigner;

/// Turns instructions into a confirmed transaction signed by the connected wallet.
#[derive(Clone)]
pub struct Submitter {
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn WalletSigner>,
    confirm: ConfirmOptions,
}

impl Submitter {
    pub fn new(rpc: Arc<dyn ChainRpc>, signer: Arc<dyn WalletSigner>, confirm: ConfirmOptions) -> Self {
        Self {
            rpc,
            signer,
            confirm,
        }
    }

    pub fn wallet(&self) -> WalletResult<Address> {
        self.signer
            .public_key()
            .ok_or(WalletError::WalletNotConnected)
    }

    /// One transaction with its own freshly fetched blockhash.
    pub async fn submit(&self, instructions: &[Instruction]) -> WalletResult<String> {
        let fee_payer = self.wallet()?;
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message =
            Message::compile(instructions, &fee_payer, decode_blockhash(&blockhash.blockhash)?)?;
        if message.num_required_signatures != 1 {
            return Err(WalletError::TransactionError(format!(
                "transaction needs {} signers, only the connected wallet can sign",
                message.num_required_signatures
            )));
        }

        let signature = self.signer.sign_message(&message.serialize()).await?;
        let mut transaction = Transaction::new_unsigned(message);
        transaction.add_signature(signature);
        let local_signature = transaction.signature_string();

        let submitted = self.rpc.send_transaction(&transaction.into_wire()?).await?;
        if local_signature.as_deref() != Some(submitted.as_str()) {
            log::debug!(
                "node returned signature {} (local {:?})",
                submitted,
                local_signature
            );
        }

        await_confirmation(self.rpc.as_ref(), &submitted, &blockhash, &self.confirm).await?;
        Ok(submitted)
    }
}

/// Executor step for a single [`TransferIntent`].
pub struct TransferStep {
    submitter: Submitter,
}

impl TransferStep {
    pub fn new(submitter: Submitter) -> Self {
        Self { submitter }
    }
}

#[async_trait]
impl TransactionStep<TransferIntent> for TransferStep {
    async fn execute(&self, _index: usize, intent: &TransferIntent) -> WalletResult<String> {
        let (recipient, amount) = intent.parts()?;
        let from = self.submitter.wallet()?;
        let instruction = system_transfer(&from, &recipient, amount)?;
        self.submitter.submit(&[instruction]).await
    }
}

/// Send every valid intent as its own transaction, in input order.
/// Invalid intents are dropped before the run and never counted.
pub async fn send_to_many<P>(
    executor: &SequentialExecutor,
    submitter: Submitter,
    intents: &[TransferIntent],
    progress: P,
) -> WalletResult<BatchReport>
where
    P: FnMut(&BatchResult) + Send,
{
    submitter.wallet()?;
    let actionable: Vec<TransferIntent> =
        intents.iter().filter(|intent| intent.valid).cloned().collect();
    if actionable.len() < intents.len() {
        log::info!(
            "Skipping {} invalid row(s) out of {}",
            intents.len() - actionable.len(),
            intents.len()
        );
    }

    let step = TransferStep::new(submitter);
    Ok(executor.run(&actionable, &step, progress).await)
}

/// Validate and send a single transfer. Returns the confirmed signature.
pub async fn send_sol(
    validator: &IntentValidator,
    submitter: &Submitter,
    address: &str,
    amount: &str,
) -> WalletResult<String> {
    let from = submitter.wallet()?;
    let intent = validator.validate_pair(1, address, amount);
    let (recipient, amount) = intent.parts()?;
    let signature = submitter
        .submit(&[system_transfer(&from, &recipient, amount)?])
        .await?;
    log::info!("Sent {} to {} ({})", amount, recipient.short(), signature);
    Ok(signature)
}
