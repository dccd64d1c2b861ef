use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use blake3::Hasher as Blake3;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;

const STORE_VERSION: u16 = 1;

/// Durable string key/value storage for user preferences.
///
/// Reads never fail: anything unreadable is reported as absent. Writes
/// surface their error so callers can decide whether it matters.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> WalletResult<()>;

    fn remove(&self, key: &str) -> WalletResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreEnvelope {
    version: u16,
    checksum: [u8; 32],
    entries: BTreeMap<String, String>,
    modified_at_unix: i64,
}

/// Preference store backed by a single checksummed JSON file.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self::new(paths.preferences_file())
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all entries, treating a missing or damaged file as empty.
    pub fn load_entries(&self) -> BTreeMap<String, String> {
        match self.try_load() {
            Ok(entries) => entries,
            Err(WalletError::NotFound(_)) => BTreeMap::new(),
            Err(err) => {
                log::warn!(
                    "Discarding unreadable preferences at {}: {}",
                    self.path.display(),
                    err
                );
                BTreeMap::new()
            }
        }
    }

    fn try_load(&self) -> WalletResult<BTreeMap<String, String>> {
        let bytes = fs::read(&self.path)?;
        let envelope: StoreEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != STORE_VERSION {
            return Err(WalletError::PersistenceError(format!(
                "Unsupported preferences version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.entries)? != envelope.checksum {
            return Err(WalletError::PersistenceError(
                "Preferences integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.entries)
    }

    fn save_entries(&self, entries: BTreeMap<String, String>) -> WalletResult<()> {
        let envelope = StoreEnvelope {
            version: STORE_VERSION,
            checksum: checksum(&entries)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            entries,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, mutate: F) -> WalletResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock();
        let mut entries = self.load_entries();
        mutate(&mut entries);
        self.save_entries(entries)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load_entries().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .write()
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

fn checksum(entries: &BTreeMap<String, String>) -> WalletResult<[u8; 32]> {
    let encoded = serde_json::to_vec(entries)?;
    let mut hasher = Blake3::new();
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}
