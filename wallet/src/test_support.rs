//! In-memory chain node and wallet used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::types::{
    BlockhashInfo, Commitment, ParsedTransaction, SignatureInfo, SignatureStatus, TokenAccount,
    UiTokenAmount,
};
use crate::blockchain::{Address, Amount};
use crate::blockchain_client::ChainRpc;
use crate::errors::{WalletError, WalletResult};
use crate::wallet_adapter::WalletSigner;

pub const OWNER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
pub const ALICE: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const BOB: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

pub fn address(s: &str) -> Address {
    Address::from_string(s).unwrap()
}

/// Rent-exempt minimum the way the chain computes it with default rent.
pub fn rent_for(space: u64) -> u64 {
    (128 + space) * 6_960
}

pub fn token_account(seed: u8, raw_amount: u64, space: u64) -> TokenAccount {
    TokenAccount {
        address: Address::new([seed; 32]),
        mint: Address::new([seed.wrapping_add(100); 32]),
        owner: address(OWNER),
        amount: UiTokenAmount {
            amount: raw_amount.to_string(),
            decimals: 6,
            ui_amount_string: raw_amount.to_string(),
        },
        lamports: Amount::from_lamports(rent_for(space)),
        space,
    }
}

#[derive(Default)]
pub struct MockRpc {
    pub balance: Mutex<u64>,
    pub token_accounts: Mutex<Vec<TokenAccount>>,
    pub signatures: Mutex<Vec<SignatureInfo>>,
    pub transactions: Mutex<HashMap<String, ParsedTransaction>>,
    /// 1-based `sendTransaction` calls that the node rejects.
    pub reject_sends: Mutex<HashSet<usize>>,
    pub unreachable: AtomicBool,
    pub blockhash_calls: AtomicUsize,
    pub rent_calls: AtomicUsize,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub blockhashes: Mutex<Vec<String>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_reachable(&self) -> WalletResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(WalletError::NetworkError("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    fn endpoint(&self) -> &str {
        "mock://node"
    }

    async fn get_balance(&self, _address: &Address) -> WalletResult<Amount> {
        self.check_reachable()?;
        Ok(Amount::from_lamports(*self.balance.lock()))
    }

    async fn get_latest_blockhash(&self) -> WalletResult<BlockhashInfo> {
        self.check_reachable()?;
        let n = self.blockhash_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let blockhash = bs58::encode([n as u8; 32]).into_string();
        self.blockhashes.lock().push(blockhash.clone());
        Ok(BlockhashInfo {
            blockhash,
            last_valid_block_height: 1_000,
        })
    }

    async fn send_transaction(&self, wire: &[u8]) -> WalletResult<String> {
        self.check_reachable()?;
        let mut sent = self.sent.lock();
        sent.push(wire.to_vec());
        if self.reject_sends.lock().contains(&sent.len()) {
            return Err(WalletError::TransactionError(
                "Transaction simulation failed: insufficient funds".into(),
            ));
        }
        // One signer: compact-u16 count (1 byte) then the signature.
        Ok(bs58::encode(&wire[1..65]).into_string())
    }

    async fn get_signature_status(&self, _signature: &str) -> WalletResult<Option<SignatureStatus>> {
        self.check_reachable()?;
        Ok(Some(SignatureStatus {
            slot: 42,
            confirmations: None,
            err: None,
            confirmation_status: Some(Commitment::Finalized),
        }))
    }

    async fn get_block_height(&self) -> WalletResult<u64> {
        self.check_reachable()?;
        Ok(10)
    }

    async fn get_token_accounts_by_owner(&self, _owner: &Address) -> WalletResult<Vec<TokenAccount>> {
        self.check_reachable()?;
        Ok(self.token_accounts.lock().clone())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> WalletResult<Amount> {
        self.check_reachable()?;
        self.rent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Amount::from_lamports(rent_for(data_len)))
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Address,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>> {
        self.check_reachable()?;
        Ok(self.signatures.lock().iter().take(limit).cloned().collect())
    }

    async fn get_parsed_transaction(&self, signature: &str) -> WalletResult<Option<ParsedTransaction>> {
        self.check_reachable()?;
        Ok(self.transactions.lock().get(signature).cloned())
    }
}

/// Wallet double: signature = blake3(message) || public key.
pub struct MockSigner {
    key: Option<Address>,
    pub reject: AtomicBool,
    pub signed: AtomicUsize,
}

impl MockSigner {
    pub fn connected(owner: &str) -> Self {
        Self {
            key: Some(address(owner)),
            reject: AtomicBool::new(false),
            signed: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            key: None,
            reject: AtomicBool::new(false),
            signed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    fn public_key(&self) -> Option<Address> {
        self.key
    }

    async fn sign_message(&self, message: &[u8]) -> WalletResult<[u8; 64]> {
        let key = self.key.ok_or(WalletError::WalletNotConnected)?;
        if self.reject.load(Ordering::SeqCst) {
            return Err(WalletError::TransactionError("User rejected the request".into()));
        }
        self.signed.fetch_add(1, Ordering::SeqCst);
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(blake3::hash(message).as_bytes());
        signature[32..].copy_from_slice(key.as_bytes());
        Ok(signature)
    }
}
