use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use solkit_wallet_lib::api::types::{ParsedTransaction, SignatureInfo, UiTokenAmount};
use solkit_wallet_lib::network::DEVNET;
use solkit_wallet_lib::validation::total_amount;
use solkit_wallet_lib::{
    Address, AlwaysConfirm, Amount, BlockhashInfo, ChainRpc, Commitment, Environment,
    FilePreferenceStore, PreferenceStore, RpcFactory, SignatureStatus, TokenAccount,
    WalletContext, WalletError, WalletResult, WalletSettings, WalletSigner,
};
use tempfile::TempDir;

const OWNER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
const RECIPIENT_A: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const RECIPIENT_C: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Node that accepts everything except the configured send attempts.
#[derive(Default)]
struct LocalNode {
    sends: AtomicUsize,
    reject_send: Option<usize>,
    token_accounts: Mutex<Vec<TokenAccount>>,
    recipients: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl ChainRpc for LocalNode {
    fn endpoint(&self) -> &str {
        "local://node"
    }

    async fn get_balance(&self, _address: &Address) -> WalletResult<Amount> {
        Ok(Amount::from_lamports(5_000_000_000))
    }

    async fn get_latest_blockhash(&self) -> WalletResult<BlockhashInfo> {
        let n = self.sends.load(Ordering::SeqCst) as u8;
        Ok(BlockhashInfo {
            blockhash: bs58::encode([n.wrapping_add(1); 32]).into_string(),
            last_valid_block_height: 500,
        })
    }

    async fn send_transaction(&self, wire: &[u8]) -> WalletResult<String> {
        let attempt = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.recipients.lock().push(wire.to_vec());
        if self.reject_send == Some(attempt) {
            return Err(WalletError::TransactionError("blockhash not found".into()));
        }
        Ok(bs58::encode(&wire[1..65]).into_string())
    }

    async fn get_signature_status(&self, _signature: &str) -> WalletResult<Option<SignatureStatus>> {
        Ok(Some(SignatureStatus {
            slot: 7,
            confirmations: None,
            err: None,
            confirmation_status: Some(Commitment::Confirmed),
        }))
    }

    async fn get_block_height(&self) -> WalletResult<u64> {
        Ok(1)
    }

    async fn get_token_accounts_by_owner(&self, _owner: &Address) -> WalletResult<Vec<TokenAccount>> {
        Ok(self.token_accounts.lock().clone())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> WalletResult<Amount> {
        Ok(Amount::from_lamports((128 + data_len) * 6_960))
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Address,
        _limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>> {
        Ok(Vec::new())
    }

    async fn get_parsed_transaction(&self, _signature: &str) -> WalletResult<Option<ParsedTransaction>> {
        Ok(None)
    }
}

struct TestWallet(Address);

#[async_trait]
impl WalletSigner for TestWallet {
    fn public_key(&self) -> Option<Address> {
        Some(self.0)
    }

    async fn sign_message(&self, message: &[u8]) -> WalletResult<[u8; 64]> {
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(blake3::hash(message).as_bytes());
        signature[32..].copy_from_slice(self.0.as_bytes());
        Ok(signature)
    }
}

fn owner() -> Address {
    Address::from_string(OWNER).expect("owner address")
}

fn context_with(node: Arc<LocalNode>, store: Arc<dyn PreferenceStore>) -> WalletContext {
    let factory: RpcFactory = Arc::new(move |_endpoint: &str| Ok(node.clone() as Arc<dyn ChainRpc>));
    WalletContext::with_rpc_factory(WalletSettings::new(Environment::Test), store, factory).expect("context")
}

fn file_store(dir: &TempDir) -> Arc<dyn PreferenceStore> {
    Arc::new(FilePreferenceStore::new(dir.path().join("preferences.json")))
}

fn empty_token_account(seed: u8) -> TokenAccount {
    TokenAccount {
        address: Address::new([seed; 32]),
        mint: Address::new([seed.wrapping_add(50); 32]),
        owner: owner(),
        amount: UiTokenAmount {
            amount: "0".into(),
            decimals: 6,
            ui_amount_string: "0".into(),
        },
        lamports: Amount::from_lamports(2_039_280),
        space: 165,
    }
}

#[test]
fn custom_rpcs_survive_restart() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let node = Arc::new(LocalNode::default());

    {
        let context = context_with(node.clone(), file_store(&dir));
        let registry = context.registry();
        let builtins_before: Vec<_> = registry
            .list_networks()
            .into_iter()
            .filter(|p| !p.is_custom)
            .collect();

        registry.add_custom_rpc("Local", "http://127.0.0.1:8899")?;
        registry.add_custom_rpc("Helius", "https://rpc.example.org/?key=abc")?;
        registry.select_network("https://rpc.example.org/?key=abc")?;

        let listed = registry.list_networks();
        assert_eq!(listed.iter().filter(|p| p.name == "Local").count(), 1);
        let builtins_after: Vec<_> = listed.into_iter().filter(|p| !p.is_custom).collect();
        assert_eq!(builtins_before, builtins_after);

        // Collisions on either field leave the registry untouched.
        let before = registry.custom_rpcs();
        assert!(matches!(
            registry.add_custom_rpc("Local", "http://10.0.0.1:8899"),
            Err(WalletError::ValidationError(_))
        ));
        assert!(matches!(
            registry.add_custom_rpc("Other", "https://api.devnet.solana.com"),
            Err(WalletError::ValidationError(_))
        ));
        assert_eq!(registry.custom_rpcs(), before);
    }

    let reopened = context_with(node, file_store(&dir));
    let names: Vec<_> = reopened
        .registry()
        .custom_rpcs()
        .into_iter()
        .map(|rpc| (rpc.name, rpc.url))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Local".to_string(), "http://127.0.0.1:8899".to_string()),
            ("Helius".to_string(), "https://rpc.example.org/?key=abc".to_string()),
        ]
    );
    assert_eq!(
        reopened.registry().active_endpoint(),
        "https://rpc.example.org/?key=abc"
    );
    Ok(())
}

#[tokio::test]
async fn deleting_selected_profile_falls_back_to_default() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let context = context_with(Arc::new(LocalNode::default()), file_store(&dir));
    let registry = context.registry();

    registry.add_custom_rpc("Local", "http://127.0.0.1:8899")?;
    registry.select_network("http://127.0.0.1:8899")?;
    context.delete_custom_rpc("Local", &AlwaysConfirm).await?;

    assert_eq!(registry.active_profile().id, DEVNET);
    assert_eq!(registry.active_endpoint(), registry.default_profile().endpoint);
    Ok(())
}

#[tokio::test]
async fn batch_excludes_invalid_rows_and_reports_in_order() -> WalletResult<()> {
    let node = Arc::new(LocalNode::default());
    let dir = TempDir::new().expect("create temp dir");
    let context = context_with(node.clone(), file_store(&dir));

    let intents = context.parse_intents(&format!("{RECIPIENT_A},1\nbad,1\n{RECIPIENT_C},2\n"));
    assert_eq!(intents.len(), 3);
    assert!(!intents[1].valid);
    assert!(intents[1].error.as_deref().is_some_and(|e| e.contains("address")));
    assert!(intents[1].amount.is_some());

    let mut progress = Vec::new();
    let report = context
        .send_to_many(Arc::new(TestWallet(owner())), &intents, None, |result| {
            progress.push(result.completed_count)
        })
        .await?;

    assert_eq!(report.result.success_count, 2);
    assert_eq!(report.result.failed_count, 0);
    assert_eq!(report.result.total_count, 2);
    assert_eq!(progress, vec![1, 2]);

    let sent = node.recipients.lock();
    let a = Address::from_string(RECIPIENT_A)?;
    let c = Address::from_string(RECIPIENT_C)?;
    assert!(sent[0].windows(32).any(|w| w == a.as_bytes()));
    assert!(sent[1].windows(32).any(|w| w == c.as_bytes()));
    Ok(())
}

#[tokio::test]
async fn failure_in_the_middle_does_not_stop_the_batch() -> WalletResult<()> {
    let node = Arc::new(LocalNode {
        reject_send: Some(2),
        ..LocalNode::default()
    });
    let dir = TempDir::new().expect("create temp dir");
    let context = context_with(node.clone(), file_store(&dir));

    let intents = context.parse_intents(&format!(
        "{RECIPIENT_A},1\n{RECIPIENT_C},2\n{RECIPIENT_A},3"
    ));
    let report = context
        .send_to_many(Arc::new(TestWallet(owner())), &intents, None, |_| {})
        .await?;

    assert_eq!(report.result.success_count, 2);
    assert_eq!(report.result.failed_count, 1);
    assert_eq!(report.result.completed_count, 3);
    assert!(report.items[1].error.is_some());
    assert_eq!(node.sends.load(Ordering::SeqCst), 3);

    let signatures: HashSet<_> = report.signatures().collect();
    assert_eq!(signatures.len(), 2);
    Ok(())
}

#[test]
fn total_is_independent_of_line_order() {
    let dir = TempDir::new().expect("create temp dir");
    let context = context_with(Arc::new(LocalNode::default()), file_store(&dir));

    let lines = [
        format!("{RECIPIENT_A},1.25"),
        format!("{RECIPIENT_C},0.000000001"),
        "bad,4".to_string(),
        format!("{RECIPIENT_A},3"),
    ];
    let forward = total_amount(&context.parse_intents(&lines.join("\n")));
    let mut reversed = lines.to_vec();
    reversed.reverse();
    let backward = total_amount(&context.parse_intents(&reversed.join("\n")));

    assert_eq!(forward, backward);
    assert_eq!(forward, Amount::from_lamports(4_250_000_001));
}

#[tokio::test]
async fn close_empty_accounts_end_to_end() -> WalletResult<()> {
    let node = Arc::new(LocalNode::default());
    *node.token_accounts.lock() = vec![empty_token_account(1), empty_token_account(2)];
    let dir = TempDir::new().expect("create temp dir");
    let context = context_with(node.clone(), file_store(&dir));

    let selection = context.scan_accounts(&owner()).await?;
    assert_eq!(selection.selected_count(), 2);
    assert_eq!(selection.total_rent(), Amount::from_lamports(2 * 2_039_280));

    node.token_accounts.lock().clear();
    let (report, refreshed) = context
        .close_selected_accounts(
            Arc::new(TestWallet(owner())),
            &selection,
            &AlwaysConfirm,
            None,
            |_| {},
        )
        .await?;

    assert_eq!(report.result.success_count, 2);
    assert!(refreshed.candidates().is_empty());
    // CloseAccount instruction data is the single byte 9.
    assert!(node.recipients.lock().iter().all(|wire| wire.ends_with(&[1, 9])));
    Ok(())
}

#[test]
fn initialize_creates_data_directory() -> WalletResult<()> {
    std::env::set_var("SOLKIT_ENV", "test");
    let temp_dir = TempDir::new().expect("create temp dir");
    let root = temp_dir.path().join("solkit");

    let context = WalletContext::initialize(root.clone())?;
    assert!(root.is_dir());
    assert_eq!(
        context.paths().map(|p| p.root_dir().to_path_buf()),
        Some(root.clone())
    );

    context.registry().add_custom_rpc("Local", "http://127.0.0.1:8899")?;
    assert!(root.join("preferences.json").is_file());
    Ok(())
}
