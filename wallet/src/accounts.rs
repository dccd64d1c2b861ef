//! Rent reclaim: find token accounts that can be closed and close them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::types::TokenAccount;
use crate::blockchain::{Address, Amount};
use crate::blockchain_client::ChainRpc;
use crate::errors::{WalletError, WalletResult};
use crate::executor::{BatchReport, BatchResult, SequentialExecutor, TransactionStep};
use crate::transaction::close_token_account;
use crate::transfer::Submitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Token,
    System,
    Program,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseCandidate {
    pub account_id: Address,
    pub kind: AccountKind,
    /// Token balance in UI units as reported by the node.
    pub token_balance: String,
    /// Token balance in base units.
    pub raw_balance: u64,
    pub mint_id: Option<Address>,
    pub rent_exempt_lamports: u64,
    pub selected: bool,
}

impl CloseCandidate {
    fn from_token_account(account: TokenAccount, rent: Amount) -> WalletResult<Self> {
        let raw_balance = account.amount.raw()?;
        let mut candidate = Self {
            account_id: account.address,
            kind: AccountKind::Token,
            token_balance: account.amount.ui_amount_string,
            raw_balance,
            mint_id: Some(account.mint),
            rent_exempt_lamports: rent.lamports(),
            selected: false,
        };
        candidate.selected = candidate.is_empty_token_account();
        Ok(candidate)
    }

    pub fn is_empty_token_account(&self) -> bool {
        self.kind == AccountKind::Token && self.raw_balance == 0
    }

    pub fn rent(&self) -> Amount {
        Amount::from_lamports(self.rent_exempt_lamports)
    }

    /// `Token (Mint...abcd)` label.
    pub fn label(&self) -> String {
        match self.mint_id {
            Some(mint) => format!("Token ({})", mint.short()),
            None => self.account_id.short(),
        }
    }
}

/// Scans an owner's token accounts and prices each one's rent deposit.
pub struct AccountCloseSelector {
    rpc: Arc<dyn ChainRpc>,
    // Rent minimum depends only on data size.
    rent_by_space: Mutex<HashMap<u64, Amount>>,
}

impl AccountCloseSelector {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            rpc,
            rent_by_space: Mutex::new(HashMap::new()),
        }
    }

    pub async fn scan(&self, owner: &Address) -> WalletResult<Vec<CloseCandidate>> {
        let accounts = self.rpc.get_token_accounts_by_owner(owner).await?;
        let mut candidates = Vec::with_capacity(accounts.len());
        for account in accounts {
            let rent = self.rent_for(account.space).await?;
            candidates.push(CloseCandidate::from_token_account(account, rent)?);
        }

        log::info!(
            "Found {} token account(s) for {}, {} empty",
            candidates.len(),
            owner.short(),
            candidates.iter().filter(|c| c.is_empty_token_account()).count()
        );
        Ok(candidates)
    }

    async fn rent_for(&self, space: u64) -> WalletResult<Amount> {
        let cached = self.rent_by_space.lock().get(&space).copied();
        if let Some(rent) = cached {
            return Ok(rent);
        }
        let rent = self.rpc.get_minimum_balance_for_rent_exemption(space).await?;
        self.rent_by_space.lock().insert(space, rent);
        Ok(rent)
    }
}

/// User-editable selection over a scan result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSelection {
    candidates: Vec<CloseCandidate>,
}

impl CloseSelection {
    pub fn new(candidates: Vec<CloseCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[CloseCandidate] {
        &self.candidates
    }

    /// Flip one candidate. Accounts still holding tokens cannot be selected.
    pub fn toggle(&mut self, account_id: &Address) -> WalletResult<bool> {
        let candidate = self
            .candidates
            .iter_mut()
            .find(|c| &c.account_id == account_id)
            .ok_or_else(|| WalletError::NotFound(format!("Account {}", account_id)))?;

        if !candidate.selected && candidate.kind == AccountKind::Token && candidate.raw_balance > 0
        {
            return Err(WalletError::ValidationError(format!(
                "Account {} still holds {} tokens",
                account_id.short(),
                candidate.token_balance
            )));
        }

        candidate.selected = !candidate.selected;
        Ok(candidate.selected)
    }

    /// Select every empty token account; returns how many are selected now.
    pub fn select_all_empty(&mut self) -> usize {
        let mut count = 0;
        for candidate in &mut self.candidates {
            if candidate.is_empty_token_account() {
                candidate.selected = true;
                count += 1;
            }
        }
        count
    }

    pub fn has_empty(&self) -> bool {
        self.candidates.iter().any(CloseCandidate::is_empty_token_account)
    }

    pub fn selected(&self) -> Vec<CloseCandidate> {
        self.candidates.iter().filter(|c| c.selected).cloned().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.selected).count()
    }

    /// Rent returned to the owner if every selected account is closed.
    pub fn total_rent(&self) -> Amount {
        self.candidates
            .iter()
            .filter(|c| c.selected)
            .map(CloseCandidate::rent)
            .sum()
    }
}

/// Executor step: close one token account, rent goes back to the wallet.
pub struct CloseAccountStep {
    submitter: Submitter,
}

impl CloseAccountStep {
    pub fn new(submitter: Submitter) -> Self {
        Self { submitter }
    }
}

#[async_trait]
impl TransactionStep<CloseCandidate> for CloseAccountStep {
    async fn execute(&self, _index: usize, candidate: &CloseCandidate) -> WalletResult<String> {
        if candidate.kind != AccountKind::Token {
            return Err(WalletError::ValidationError(format!(
                "Only token accounts can be closed, {} is {:?}",
                candidate.account_id.short(),
                candidate.kind
            )));
        }
        let owner = self.submitter.wallet()?;
        let instruction = close_token_account(&candidate.account_id, &owner, &owner);
        self.submitter.submit(&[instruction]).await
    }
}

/// Close the given candidates one transaction at a time.
pub async fn close_accounts<P>(
    executor: &SequentialExecutor,
    submitter: Submitter,
    candidates: &[CloseCandidate],
    progress: P,
) -> WalletResult<BatchReport>
where
    P: FnMut(&BatchResult) + Send,
{
    submitter.wallet()?;
    let step = CloseAccountStep::new(submitter);
    Ok(executor.run(candidates, &step, progress).await)
}
