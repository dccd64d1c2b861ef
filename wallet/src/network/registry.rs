//! Registry of known RPC endpoints and the one currently in use.
//!
//! Built-in clusters are fixed; custom profiles are user supplied and
//! persisted through a [`PreferenceStore`]. The selected profile always
//! resolves: anything that would leave it dangling resets it to the default
//! built-in instead.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config_store::PreferenceStore;
use crate::errors::{WalletError, WalletResult};

/// Preference key holding the JSON array of custom `{name, url}` entries.
pub const CUSTOM_RPCS_KEY: &str = "customRpcs";
/// Preference key holding the id of the selected profile.
pub const SELECTED_NETWORK_KEY: &str = "selectedNetwork";

pub const DEVNET: &str = "devnet";
pub const TESTNET: &str = "testnet";
pub const MAINNET_BETA: &str = "mainnet-beta";

const BUILTINS: [(&str, &str, &str); 3] = [
    (DEVNET, "Devnet", "https://api.devnet.solana.com"),
    (TESTNET, "Testnet", "https://api.testnet.solana.com"),
    (MAINNET_BETA, "Mainnet Beta", "https://api.mainnet-beta.solana.com"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    /// Cluster name for built-ins, the endpoint URL for custom profiles.
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub is_custom: bool,
}

impl NetworkProfile {
    fn custom(name: String, url: String) -> Self {
        Self {
            id: url.clone(),
            name,
            endpoint: url,
            is_custom: true,
        }
    }
}

/// Persisted form of a custom profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRpc {
    pub name: String,
    pub url: String,
}

pub fn builtin_networks() -> Vec<NetworkProfile> {
    BUILTINS
        .iter()
        .map(|(id, name, endpoint)| NetworkProfile {
            id: id.to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            is_custom: false,
        })
        .collect()
}

#[derive(Debug)]
struct RegistryState {
    custom: Vec<NetworkProfile>,
    selected_id: String,
}

/// Owns the network list and selection. Constructed once per process and
/// shared behind an `Arc`.
pub struct NetworkRegistry {
    builtins: Vec<NetworkProfile>,
    default_id: String,
    state: RwLock<RegistryState>,
    store: Arc<dyn PreferenceStore>,
    active_batches: Arc<AtomicUsize>,
}

impl std::fmt::Debug for NetworkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRegistry")
            .field("default_id", &self.default_id)
            .field("state", &*self.state.read())
            .field("active_batches", &self.active_batches.load(Ordering::SeqCst))
            .finish()
    }
}

/// Held for the duration of a batch run; registry mutations are refused
/// while any guard is alive.
#[must_use = "the registry is only locked while the guard is held"]
#[derive(Debug)]
pub struct BatchGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NetworkRegistry {
    /// Load the registry from `store`. `default_id` must name a built-in
    /// cluster; anything else falls back to devnet.
    pub fn load(store: Arc<dyn PreferenceStore>, default_id: &str) -> Self {
        let builtins = builtin_networks();
        let default_id = if builtins.iter().any(|n| n.id == default_id) {
            default_id.to_string()
        } else {
            log::warn!(
                "Default network '{}' is not a built-in cluster, using {}",
                default_id,
                DEVNET
            );
            DEVNET.to_string()
        };

        let custom = load_custom_profiles(store.as_ref(), &builtins);
        let registry = Self {
            builtins,
            state: RwLock::new(RegistryState {
                custom,
                selected_id: default_id.clone(),
            }),
            default_id,
            store,
            active_batches: Arc::new(AtomicUsize::new(0)),
        };

        if let Some(saved) = registry.store.get(SELECTED_NETWORK_KEY) {
            let mut state = registry.state.write();
            if registry.resolve(&state, &saved).is_some() {
                state.selected_id = saved;
            } else {
                log::warn!(
                    "Saved network '{}' no longer exists, using {}",
                    saved,
                    registry.default_id
                );
            }
        }

        registry
    }

    /// Built-ins followed by custom profiles in insertion order.
    pub fn list_networks(&self) -> Vec<NetworkProfile> {
        let state = self.state.read();
        self.builtins
            .iter()
            .chain(state.custom.iter())
            .cloned()
            .collect()
    }

    pub fn custom_rpcs(&self) -> Vec<CustomRpc> {
        to_custom_rpcs(&self.state.read().custom)
    }

    /// Select a profile by id. Unknown ids reset the selection to the default
    /// built-in and log a warning; only an in-flight batch makes this fail.
    pub fn select_network(&self, id: &str) -> WalletResult<NetworkProfile> {
        let mut state = self.state.write();
        self.ensure_idle()?;

        let selected = match self.resolve(&state, id) {
            Some(profile) => profile,
            None => {
                log::warn!(
                    "Network with id '{}' not found. Defaulting to {}",
                    id,
                    self.default_id
                );
                self.default_profile().clone()
            }
        };

        state.selected_id = selected.id.clone();
        self.persist_selection(&selected.id);
        log::info!("Selected network {} ({})", selected.name, selected.endpoint);
        Ok(selected)
    }

    pub fn add_custom_rpc(&self, name: &str, url: &str) -> WalletResult<NetworkProfile> {
        let mut state = self.state.write();
        self.ensure_idle()?;

        let (name, url) = validate_entry(name, url)?;
        self.ensure_unique(&state, &name, &url, None)?;

        let profile = NetworkProfile::custom(name, url);
        let mut updated = state.custom.clone();
        updated.push(profile.clone());
        self.persist_custom(&updated)?;
        state.custom = updated;

        log::info!("Added custom RPC {} ({})", profile.name, profile.endpoint);
        Ok(profile)
    }

    /// Replace the custom profile named `original_name`, keeping its position.
    pub fn update_custom_rpc(
        &self,
        original_name: &str,
        new_name: &str,
        new_url: &str,
    ) -> WalletResult<NetworkProfile> {
        let mut state = self.state.write();
        self.ensure_idle()?;

        let position = custom_position(&state, original_name)?;
        let (name, url) = validate_entry(new_name, new_url)?;
        self.ensure_unique(&state, &name, &url, Some(position))?;

        let previous_id = state.custom[position].id.clone();
        let profile = NetworkProfile::custom(name, url);
        let mut updated = state.custom.clone();
        updated[position] = profile.clone();
        self.persist_custom(&updated)?;
        state.custom = updated;

        if state.selected_id == previous_id {
            state.selected_id = profile.id.clone();
            self.persist_selection(&profile.id);
        }

        log::info!(
            "Updated custom RPC '{}' -> {} ({})",
            original_name,
            profile.name,
            profile.endpoint
        );
        Ok(profile)
    }

    pub fn delete_custom_rpc(&self, name: &str) -> WalletResult<NetworkProfile> {
        let mut state = self.state.write();
        self.ensure_idle()?;

        let position = custom_position(&state, name)?;
        let mut updated = state.custom.clone();
        let removed = updated.remove(position);
        self.persist_custom(&updated)?;
        state.custom = updated;

        if state.selected_id == removed.id {
            log::info!(
                "Deleted the selected network, switching to {}",
                self.default_id
            );
            state.selected_id = self.default_id.clone();
            self.persist_selection(&self.default_id);
        }

        log::info!("Deleted custom RPC {} ({})", removed.name, removed.endpoint);
        Ok(removed)
    }

    pub fn active_profile(&self) -> NetworkProfile {
        let state = self.state.read();
        self.resolve(&state, &state.selected_id)
            .unwrap_or_else(|| self.default_profile().clone())
    }

    /// Endpoint every chain query and batch run must use.
    pub fn active_endpoint(&self) -> String {
        self.active_profile().endpoint
    }

    pub fn default_profile(&self) -> &NetworkProfile {
        self.builtins
            .iter()
            .find(|n| n.id == self.default_id)
            .unwrap_or(&self.builtins[0])
    }

    /// Freeze the registry for a batch run.
    pub fn begin_batch(&self) -> BatchGuard {
        // Taken under the write lock so no mutation can interleave with the increment.
        let _state = self.state.write();
        self.active_batches.fetch_add(1, Ordering::SeqCst);
        BatchGuard {
            counter: Arc::clone(&self.active_batches),
        }
    }

    pub fn batch_in_progress(&self) -> bool {
        self.active_batches.load(Ordering::SeqCst) > 0
    }

    fn ensure_idle(&self) -> WalletResult<()> {
        if self.batch_in_progress() {
            return Err(WalletError::BatchInProgress);
        }
        Ok(())
    }

    fn resolve(&self, state: &RegistryState, id: &str) -> Option<NetworkProfile> {
        self.builtins
            .iter()
            .chain(state.custom.iter())
            .find(|n| n.id == id)
            .cloned()
    }

    fn ensure_unique(
        &self,
        state: &RegistryState,
        name: &str,
        url: &str,
        skip_custom: Option<usize>,
    ) -> WalletResult<()> {
        let others = state
            .custom
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip_custom)
            .map(|(_, profile)| profile);

        for existing in self.builtins.iter().chain(others) {
            if existing.name == name || existing.endpoint == url {
                return Err(WalletError::ValidationError(format!(
                    "An RPC with this name or URL already exists ({})",
                    existing.name
                )));
            }
        }
        Ok(())
    }

    fn persist_custom(&self, profiles: &[NetworkProfile]) -> WalletResult<()> {
        let encoded = serde_json::to_string(&to_custom_rpcs(profiles))?;
        self.store.set(CUSTOM_RPCS_KEY, &encoded)
    }

    fn persist_selection(&self, id: &str) {
        if let Err(err) = self.store.set(SELECTED_NETWORK_KEY, id) {
            log::warn!("Failed to remember selected network: {}", err);
        }
    }
}

fn custom_position(state: &RegistryState, name: &str) -> WalletResult<usize> {
    state
        .custom
        .iter()
        .position(|n| n.name == name)
        .ok_or_else(|| WalletError::NotFound(format!("Custom RPC '{}'", name)))
}

fn to_custom_rpcs(profiles: &[NetworkProfile]) -> Vec<CustomRpc> {
    profiles
        .iter()
        .map(|p| CustomRpc {
            name: p.name.clone(),
            url: p.endpoint.clone(),
        })
        .collect()
}

/// Trim and check a name/url pair; the URL must be absolute http(s) with a host.
pub fn validate_entry(name: &str, url: &str) -> WalletResult<(String, String)> {
    let name = name.trim();
    let url = url.trim();
    if name.is_empty() {
        return Err(WalletError::ValidationError(
            "RPC name cannot be empty".to_string(),
        ));
    }
    if url.is_empty() {
        return Err(WalletError::ValidationError(
            "RPC URL cannot be empty".to_string(),
        ));
    }

    let parsed = Url::parse(url)
        .map_err(|e| WalletError::ValidationError(format!("Invalid RPC URL '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(WalletError::ValidationError(format!(
            "RPC URL must be an http(s) address: {}",
            url
        )));
    }

    Ok((name.to_string(), url.to_string()))
}

fn load_custom_profiles(store: &dyn PreferenceStore, builtins: &[NetworkProfile]) -> Vec<NetworkProfile> {
    let Some(raw) = store.get(CUSTOM_RPCS_KEY) else {
        return Vec::new();
    };

    let entries: Vec<CustomRpc> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Discarding malformed {} payload: {}", CUSTOM_RPCS_KEY, err);
            return Vec::new();
        }
    };

    let mut names: HashSet<String> = builtins.iter().map(|n| n.name.clone()).collect();
    let mut urls: HashSet<String> = builtins.iter().map(|n| n.endpoint.clone()).collect();
    let mut profiles = Vec::with_capacity(entries.len());
    for entry in entries {
        match validate_entry(&entry.name, &entry.url) {
            Ok((name, url)) if !names.contains(&name) && !urls.contains(&url) => {
                names.insert(name.clone());
                urls.insert(url.clone());
                profiles.push(NetworkProfile::custom(name, url));
            }
            Ok(_) => log::warn!("Skipping duplicate stored RPC '{}'", entry.name),
            Err(err) => log::warn!("Skipping stored RPC '{}': {}", entry.name, err),
        }
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::MemoryPreferenceStore;
    use std::sync::atomic::AtomicBool;

    /// Memory store whose writes can be switched to fail.
    struct FlakyStore {
        inner: MemoryPreferenceStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryPreferenceStore::new(),
                fail_writes: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.fail_writes.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> WalletResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(WalletError::StorageError("disk full".to_string()));
            }
            Ok(())
        }
    }

    impl PreferenceStore for FlakyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> WalletResult<()> {
            self.check()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> WalletResult<()> {
            self.check()?;
            self.inner.remove(key)
        }
    }

    fn registry() -> (NetworkRegistry, Arc<MemoryPreferenceStore>) {
        let store = Arc::new(MemoryPreferenceStore::new());
        (NetworkRegistry::load(store.clone(), DEVNET), store)
    }

    #[test]
    fn builtins_listed_first() {
        let (registry, _) = registry();
        let ids: Vec<_> = registry.list_networks().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![DEVNET, TESTNET, MAINNET_BETA]);
        assert_eq!(registry.active_endpoint(), "https://api.devnet.solana.com");
    }

    #[test]
    fn add_appends_once_and_persists() {
        let (registry, store) = registry();
        registry.add_custom_rpc("Local", "http://127.0.0.1:8899").unwrap();
        registry.add_custom_rpc("Helius", "https://rpc.example.com").unwrap();

        let networks = registry.list_networks();
        assert_eq!(networks.len(), 5);
        assert_eq!(networks[..3], builtin_networks()[..]);
        assert_eq!(networks.iter().filter(|n| n.name == "Local").count(), 1);
        assert_eq!(networks[3].id, "http://127.0.0.1:8899");
        assert!(networks[3].is_custom);

        let stored: Vec<CustomRpc> =
            serde_json::from_str(&store.get(CUSTOM_RPCS_KEY).unwrap()).unwrap();
        assert_eq!(stored, registry.custom_rpcs());
    }

    #[test]
    fn collisions_leave_state_unchanged() {
        let (registry, store) = registry();
        registry.add_custom_rpc("Local", "http://127.0.0.1:8899").unwrap();
        let before = registry.list_networks();
        let persisted = store.get(CUSTOM_RPCS_KEY);

        for (name, url) in [
            ("Local", "http://other:8899"),
            ("Other", "http://127.0.0.1:8899"),
            ("Devnet", "http://fresh:1"),
            ("Fresh", "https://api.testnet.solana.com"),
            ("", "http://x"),
            ("x", ""),
            ("x", "ftp://files.example.com"),
            ("x", "not a url"),
        ] {
            let err = registry.add_custom_rpc(name, url).unwrap_err();
            assert!(matches!(err, WalletError::ValidationError(_)), "{name}/{url}");
        }

        assert_eq!(registry.list_networks(), before);
        assert_eq!(store.get(CUSTOM_RPCS_KEY), persisted);
    }

    #[test]
    fn update_keeps_position_and_excludes_self() {
        let (registry, _) = registry();
        registry.add_custom_rpc("A", "http://a:1").unwrap();
        registry.add_custom_rpc("B", "http://b:1").unwrap();

        // Same name and URL as itself is not a conflict.
        registry.update_custom_rpc("A", "A", "http://a:1").unwrap();
        registry.update_custom_rpc("A", "A2", "http://a:2").unwrap();
        let customs = registry.custom_rpcs();
        assert_eq!(customs[0].name, "A2");
        assert_eq!(customs[0].url, "http://a:2");
        assert_eq!(customs[1].name, "B");

        assert!(matches!(
            registry.update_custom_rpc("A2", "B", "http://a:3"),
            Err(WalletError::ValidationError(_))
        ));
        assert!(matches!(
            registry.update_custom_rpc("missing", "C", "http://c:1"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn updating_selected_profile_follows_new_url() {
        let (registry, _) = registry();
        registry.add_custom_rpc("A", "http://a:1").unwrap();
        registry.select_network("http://a:1").unwrap();
        registry.update_custom_rpc("A", "A", "http://a:2").unwrap();
        assert_eq!(registry.active_endpoint(), "http://a:2");
    }

    #[test]
    fn deleting_selected_resets_to_default() {
        let (registry, _) = registry();
        registry.add_custom_rpc("A", "http://a:1").unwrap();
        registry.select_network("http://a:1").unwrap();
        assert_eq!(registry.active_endpoint(), "http://a:1");

        registry.delete_custom_rpc("A").unwrap();
        assert_eq!(registry.active_endpoint(), "https://api.devnet.solana.com");
        assert!(registry.custom_rpcs().is_empty());
        assert!(matches!(
            registry.delete_custom_rpc("A"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_selection_falls_back() {
        let (registry, _) = registry();
        registry.select_network(TESTNET).unwrap();
        let selected = registry.select_network("nope").unwrap();
        assert_eq!(selected.id, DEVNET);
        assert_eq!(registry.active_profile().id, DEVNET);
    }

    #[test]
    fn reload_restores_list_and_selection() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let first = NetworkRegistry::load(store.clone(), DEVNET);
        first.add_custom_rpc("One", "http://one:1").unwrap();
        first.add_custom_rpc("Two", "https://two.example").unwrap();
        first.select_network("https://two.example").unwrap();

        let second = NetworkRegistry::load(store, DEVNET);
        assert_eq!(second.custom_rpcs(), first.custom_rpcs());
        assert_eq!(second.active_endpoint(), "https://two.example");
    }

    #[test]
    fn malformed_storage_means_no_customs() {
        for payload in ["{\"name\":\"x\"}", "not json", "[1,2]", "null"] {
            let store = Arc::new(MemoryPreferenceStore::with_entry(CUSTOM_RPCS_KEY, payload));
            let registry = NetworkRegistry::load(store, DEVNET);
            assert_eq!(registry.list_networks().len(), 3, "{payload}");
        }
    }

    #[test]
    fn invalid_default_uses_devnet() {
        let registry = NetworkRegistry::load(Arc::new(MemoryPreferenceStore::new()), "localnet");
        assert_eq!(registry.default_profile().id, DEVNET);

        let registry = NetworkRegistry::load(Arc::new(MemoryPreferenceStore::new()), MAINNET_BETA);
        assert_eq!(registry.active_profile().id, MAINNET_BETA);
    }

    #[test]
    fn batch_guard_blocks_mutation() {
        let (registry, _) = registry();
        registry.add_custom_rpc("A", "http://a:1").unwrap();

        let guard = registry.begin_batch();
        assert!(registry.batch_in_progress());
        assert_eq!(
            registry.select_network(TESTNET),
            Err(WalletError::BatchInProgress)
        );
        assert_eq!(
            registry.add_custom_rpc("B", "http://b:1"),
            Err(WalletError::BatchInProgress)
        );
        assert_eq!(
            registry.update_custom_rpc("A", "A2", "http://a:2"),
            Err(WalletError::BatchInProgress)
        );
        assert_eq!(
            registry.delete_custom_rpc("A"),
            Err(WalletError::BatchInProgress)
        );
        assert_eq!(registry.active_profile().id, DEVNET);
        assert_eq!(registry.custom_rpcs()[0].url, "http://a:1");

        drop(guard);
        assert!(!registry.batch_in_progress());
        registry.select_network(TESTNET).unwrap();
    }

    #[test]
    fn failed_persist_changes_nothing() {
        let store = Arc::new(FlakyStore::new());
        let registry = NetworkRegistry::load(store.clone(), DEVNET);
        registry.add_custom_rpc("A", "http://a:1").unwrap();
        registry.select_network("http://a:1").unwrap();

        let before = registry.list_networks();
        let persisted = store.get(CUSTOM_RPCS_KEY);
        store.set_failing(true);

        assert!(matches!(
            registry.add_custom_rpc("B", "http://b:1"),
            Err(WalletError::StorageError(_))
        ));
        assert!(matches!(
            registry.update_custom_rpc("A", "A2", "http://a:2"),
            Err(WalletError::StorageError(_))
        ));
        assert!(matches!(
            registry.delete_custom_rpc("A"),
            Err(WalletError::StorageError(_))
        ));

        assert_eq!(registry.list_networks(), before);
        assert_eq!(registry.active_endpoint(), "http://a:1");
        assert_eq!(store.get(CUSTOM_RPCS_KEY), persisted);

        store.set_failing(false);
        registry.delete_custom_rpc("A").unwrap();
        assert_eq!(registry.active_profile().id, DEVNET);
        assert_eq!(store.get(CUSTOM_RPCS_KEY).as_deref(), Some("[]"));
    }
}
