use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the wallet.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Path to the persisted preference store.
    preferences_file: PathBuf,
}

impl WalletPaths {
    pub const PREFERENCES_FILENAME: &'static str = "preferences.json";
    /// Environment variable overriding the data directory.
    pub const DATA_DIR_ENV: &'static str = "SOLKIT_DATA_DIR";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            preferences_file: root_dir.join(Self::PREFERENCES_FILENAME),
            root_dir,
        })
    }

    /// Resolve the data directory: `SOLKIT_DATA_DIR`, then `$HOME/.solkit`,
    /// then `.solkit` under the working directory.
    pub fn from_env() -> WalletResult<Self> {
        if let Some(dir) = env::var_os(Self::DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Self::new(dir);
        }

        let home = env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .filter(|v| !v.is_empty());
        match home {
            Some(home) => Self::new(PathBuf::from(home).join(".solkit")),
            None => Self::new(env::current_dir()?.join(".solkit")),
        }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(())
    }

    pub fn preferences_file(&self) -> &Path {
        &self.preferences_file
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
