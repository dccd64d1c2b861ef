use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::accounts::{close_accounts, AccountCloseSelector, CloseSelection};
use crate::balance::{BalancePoller, PollerHandle};
use crate::blockchain::{Address, Amount};
use crate::blockchain_client::{BlockchainClient, ChainRpc};
use crate::config_store::{FilePreferenceStore, PreferenceStore};
use crate::errors::{WalletError, WalletResult};
use crate::executor::{
    BatchReport, BatchResult, ConfirmOptions, ExecutorOptions, SequentialExecutor,
};
use crate::history::{HistoryEntry, HistoryFetcher};
use crate::network::{explorer_url, NetworkProfile, NetworkRegistry};
use crate::settings::WalletSettings;
use crate::storage::WalletPaths;
use crate::transfer::{send_sol, send_to_many, Submitter};
use crate::validation::{IntentValidator, TransferIntent};
use crate::wallet_adapter::{ConfirmationRequest, Confirmer, WalletSigner};

/// Opens a chain connection for an endpoint URL.
pub type RpcFactory = Arc<dyn Fn(&str) -> WalletResult<Arc<dyn ChainRpc>> + Send + Sync>;

/// Process-wide wallet services. Every chain call goes to the registry's
/// active endpoint at the time of the call.
pub struct WalletContext {
    paths: Option<WalletPaths>,
    settings: WalletSettings,
    registry: Arc<NetworkRegistry>,
    validator: IntentValidator,
    rpc_factory: RpcFactory,
}

impl WalletContext {
    /// Settings from the environment, preferences under `root_dir`.
    pub fn initialize(root_dir: PathBuf) -> WalletResult<Self> {
        let settings = WalletSettings::from_env()?;
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::from_paths(&paths));
        let mut context = Self::with_store(settings, store)?;
        context.paths = Some(paths);
        Ok(context)
    }

    /// Build with an explicit store and HTTP connections to the chain.
    pub fn with_store(
        settings: WalletSettings,
        store: Arc<dyn PreferenceStore>,
    ) -> WalletResult<Self> {
        let commitment = settings.commitment()?;
        let timeout = settings.rpc_timeout()?;
        let factory: RpcFactory = Arc::new(move |endpoint: &str| {
            let client = BlockchainClient::with_timeout(endpoint, commitment, timeout)?;
            Ok(Arc::new(client) as Arc<dyn ChainRpc>)
        });
        Self::with_rpc_factory(settings, store, factory)
    }

    pub fn with_rpc_factory(
        settings: WalletSettings,
        store: Arc<dyn PreferenceStore>,
        rpc_factory: RpcFactory,
    ) -> WalletResult<Self> {
        settings.validate()?;
        let registry = Arc::new(NetworkRegistry::load(store, &settings.default_network()));
        log::info!(
            "Wallet context ready on {} ({})",
            registry.active_profile().name,
            registry.active_endpoint()
        );

        Ok(Self {
            paths: None,
            settings,
            registry,
            validator: IntentValidator::new()?,
            rpc_factory,
        })
    }

    pub fn paths(&self) -> Option<&WalletPaths> {
        self.paths.as_ref()
    }

    pub fn settings(&self) -> &WalletSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub fn validator(&self) -> &IntentValidator {
        &self.validator
    }

    /// Connection to the currently selected endpoint.
    pub fn rpc(&self) -> WalletResult<Arc<dyn ChainRpc>> {
        (self.rpc_factory)(&self.registry.active_endpoint())
    }

    pub fn parse_intents(&self, raw_text: &str) -> Vec<TransferIntent> {
        self.validator.parse(raw_text)
    }

    pub fn explorer_url(&self, signature: &str) -> WalletResult<String> {
        explorer_url(
            &self.settings.explorer_host(),
            signature,
            &self.registry.active_profile(),
        )
    }

    /// Delete a custom RPC after the user agrees.
    pub async fn delete_custom_rpc(
        &self,
        name: &str,
        confirmer: &dyn Confirmer,
    ) -> WalletResult<NetworkProfile> {
        if !self.registry.custom_rpcs().iter().any(|rpc| rpc.name == name) {
            return Err(WalletError::NotFound(format!("Custom RPC '{}'", name)));
        }
        let request = ConfirmationRequest::DeleteCustomRpc {
            name: name.to_string(),
        };
        if !confirmer.confirm(&request).await {
            return Err(WalletError::Cancelled(request.prompt()));
        }
        self.registry.delete_custom_rpc(name)
    }

    pub async fn balance(&self, address: &Address) -> WalletResult<Amount> {
        self.rpc()?.get_balance(address).await
    }

    /// Start refreshing the connected wallet's balance on the configured interval.
    pub fn watch_balance<F>(&self, signer: &dyn WalletSigner, sink: F) -> WalletResult<PollerHandle>
    where
        F: FnMut(Option<Amount>) + Send + 'static,
    {
        let owner = connected(signer)?;
        let period = self.settings.balance_poll_interval()?;
        Ok(BalancePoller::spawn(self.rpc()?, owner, period, sink))
    }

    pub async fn history(&self, address: &Address) -> WalletResult<Vec<HistoryEntry>> {
        HistoryFetcher::new(self.rpc()?, self.settings.history_limit()?)
            .fetch(address)
            .await
    }

    pub async fn scan_accounts(&self, owner: &Address) -> WalletResult<CloseSelection> {
        let candidates = AccountCloseSelector::new(self.rpc()?).scan(owner).await?;
        Ok(CloseSelection::new(candidates))
    }

    /// Send every valid intent in order. The network cannot be changed while
    /// the batch runs.
    pub async fn send_to_many<P>(
        &self,
        signer: Arc<dyn WalletSigner>,
        intents: &[TransferIntent],
        cancel: Option<CancellationToken>,
        progress: P,
    ) -> WalletResult<BatchReport>
    where
        P: FnMut(&BatchResult) + Send,
    {
        connected(signer.as_ref())?;
        let _batch = self.registry.begin_batch();
        let submitter = self.submitter(signer)?;
        send_to_many(&self.executor(cancel)?, submitter, intents, progress).await
    }

    pub async fn send_sol(
        &self,
        signer: Arc<dyn WalletSigner>,
        address: &str,
        amount: &str,
    ) -> WalletResult<String> {
        connected(signer.as_ref())?;
        let _batch = self.registry.begin_batch();
        let submitter = self.submitter(signer)?;
        send_sol(&self.validator, &submitter, address, amount).await
    }

    /// Close the selected accounts after confirmation, then rescan so the
    /// returned selection reflects what is left on chain.
    pub async fn close_selected_accounts<P>(
        &self,
        signer: Arc<dyn WalletSigner>,
        selection: &CloseSelection,
        confirmer: &dyn Confirmer,
        cancel: Option<CancellationToken>,
        progress: P,
    ) -> WalletResult<(BatchReport, CloseSelection)>
    where
        P: FnMut(&BatchResult) + Send,
    {
        let owner = connected(signer.as_ref())?;
        let selected = selection.selected();
        if !selected.is_empty() {
            let request = ConfirmationRequest::CloseAccounts {
                count: selected.len(),
                reclaimable: selection.total_rent(),
            };
            if !confirmer.confirm(&request).await {
                return Err(WalletError::Cancelled(request.prompt()));
            }
        }

        let report = {
            let _batch = self.registry.begin_batch();
            let submitter = self.submitter(signer)?;
            close_accounts(&self.executor(cancel)?, submitter, &selected, progress).await?
        };

        let refreshed = match self.scan_accounts(&owner).await {
            Ok(selection) => selection,
            Err(err) => {
                log::warn!("Rescan after closing accounts failed: {}", err);
                selection.clone()
            }
        };
        Ok((report, refreshed))
    }

    fn submitter(&self, signer: Arc<dyn WalletSigner>) -> WalletResult<Submitter> {
        Ok(Submitter::new(
            self.rpc()?,
            signer,
            ConfirmOptions::from_settings(&self.settings)?,
        ))
    }

    fn executor(&self, cancel: Option<CancellationToken>) -> WalletResult<SequentialExecutor> {
        Ok(SequentialExecutor::new(ExecutorOptions {
            cancel,
            fail_fast_on_network: self.settings.fail_fast_on_network()?,
        }))
    }
}

fn connected(signer: &dyn WalletSigner) -> WalletResult<Address> {
    signer.public_key().ok_or(WalletError::WalletNotConnected)
}
