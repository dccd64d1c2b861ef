use crate::api::types::Commitment;
use crate::errors::{WalletError, WalletResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const KEY_LOG_LEVEL: &str = "LOG_LEVEL";
const KEY_DEFAULT_NETWORK: &str = "DEFAULT_NETWORK";
const KEY_COMMITMENT: &str = "COMMITMENT";
const KEY_RPC_TIMEOUT_SECONDS: &str = "RPC_TIMEOUT_SECONDS";
const KEY_CONFIRM_TIMEOUT_SECONDS: &str = "CONFIRM_TIMEOUT_SECONDS";
const KEY_CONFIRM_POLL_MILLIS: &str = "CONFIRM_POLL_MILLIS";
const KEY_BALANCE_POLL_SECONDS: &str = "BALANCE_POLL_SECONDS";
const KEY_HISTORY_LIMIT: &str = "HISTORY_LIMIT";
const KEY_EXPLORER_HOST: &str = "EXPLORER_HOST";
const KEY_FAIL_FAST_ON_NETWORK: &str = "FAIL_FAST_ON_NETWORK";

/// Deployment environment, selects the default values below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Runtime settings: environment defaults overlaid with `SOLKIT_*` variables.
#[derive(Debug, Clone)]
pub struct WalletSettings {
    environment: Environment,
    config_map: HashMap<String, String>,
}

impl WalletSettings {
    pub fn new(environment: Environment) -> Self {
        let mut settings = WalletSettings {
            environment,
            config_map: HashMap::new(),
        };
        settings.load_defaults();
        settings
    }

    /// Environment is taken from `SOLKIT_ENV`, then variables are applied.
    pub fn from_env() -> WalletResult<Self> {
        let env_str = std::env::var("SOLKIT_ENV").unwrap_or_else(|_| "development".to_string());
        Self::from_environment(Environment::from_name(&env_str))
    }

    pub fn from_environment(environment: Environment) -> WalletResult<Self> {
        let mut settings = Self::new(environment);
        settings.load_from_env_vars();
        settings.validate()?;
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config_map.get(key)
    }

    pub fn get_or_default(&self, key: &str, default: &str) -> String {
        self.config_map
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool_with_default(&self, key: &str, default: bool) -> WalletResult<bool> {
        match self.config_map.get(key) {
            Some(value) => parse_bool_flag(value, key),
            None => Ok(default),
        }
    }

    pub fn get_u32_with_default(&self, key: &str, default: u32) -> WalletResult<u32> {
        match self.config_map.get(key) {
            Some(value) => parse_u32_value(value, key),
            None => Ok(default),
        }
    }

    /// Override a value (tests and the CLI use this).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config_map.insert(key.into(), value.into());
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn log_level(&self) -> String {
        self.get_or_default(KEY_LOG_LEVEL, "INFO")
    }

    pub fn default_network(&self) -> String {
        self.get_or_default(KEY_DEFAULT_NETWORK, "devnet")
    }

    pub fn commitment(&self) -> WalletResult<Commitment> {
        let raw = self.get_or_default(KEY_COMMITMENT, "confirmed");
        raw.parse()
    }

    pub fn rpc_timeout(&self) -> WalletResult<Duration> {
        let secs = self.get_u32_with_default(KEY_RPC_TIMEOUT_SECONDS, 30)?.max(1);
        Ok(Duration::from_secs(secs as u64))
    }

    pub fn confirm_timeout(&self) -> WalletResult<Duration> {
        let secs = self
            .get_u32_with_default(KEY_CONFIRM_TIMEOUT_SECONDS, 60)?
            .max(1);
        Ok(Duration::from_secs(secs as u64))
    }

    pub fn confirm_poll_interval(&self) -> WalletResult<Duration> {
        let millis = self
            .get_u32_with_default(KEY_CONFIRM_POLL_MILLIS, 500)?
            .clamp(50, 10_000);
        Ok(Duration::from_millis(millis as u64))
    }

    pub fn balance_poll_interval(&self) -> WalletResult<Duration> {
        let secs = self
            .get_u32_with_default(KEY_BALANCE_POLL_SECONDS, 15)?
            .max(1);
        Ok(Duration::from_secs(secs as u64))
    }

    pub fn history_limit(&self) -> WalletResult<usize> {
        Ok(self.get_u32_with_default(KEY_HISTORY_LIMIT, 10)?.clamp(1, 1000) as usize)
    }

    pub fn explorer_host(&self) -> String {
        self.get_or_default(KEY_EXPLORER_HOST, "explorer.solana.com")
    }

    /// Stop a batch at the first transport failure instead of attempting every item.
    pub fn fail_fast_on_network(&self) -> WalletResult<bool> {
        self.get_bool_with_default(KEY_FAIL_FAST_ON_NETWORK, false)
    }

    /// Every typed getter must parse; bad overrides fail at startup, not mid-batch.
    pub fn validate(&self) -> WalletResult<()> {
        self.commitment()?;
        self.rpc_timeout()?;
        self.confirm_timeout()?;
        self.confirm_poll_interval()?;
        self.balance_poll_interval()?;
        self.history_limit()?;
        self.fail_fast_on_network()?;
        if self.explorer_host().trim().is_empty() {
            return Err(WalletError::ValidationError(
                "Explorer host cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn load_defaults(&mut self) {
        let defaults: &[(&str, &str)] = match self.environment {
            Environment::Production => &[
                (KEY_LOG_LEVEL, "INFO"),
                (KEY_DEFAULT_NETWORK, "mainnet-beta"),
                (KEY_COMMITMENT, "confirmed"),
                (KEY_CONFIRM_TIMEOUT_SECONDS, "90"),
            ],
            Environment::Development => &[
                (KEY_LOG_LEVEL, "DEBUG"),
                (KEY_DEFAULT_NETWORK, "devnet"),
                (KEY_COMMITMENT, "confirmed"),
                (KEY_CONFIRM_TIMEOUT_SECONDS, "60"),
            ],
            Environment::Test => &[
                (KEY_LOG_LEVEL, "WARN"),
                (KEY_DEFAULT_NETWORK, "devnet"),
                (KEY_COMMITMENT, "confirmed"),
                (KEY_CONFIRM_TIMEOUT_SECONDS, "5"),
                (KEY_CONFIRM_POLL_MILLIS, "50"),
            ],
        };

        for (key, value) in defaults {
            self.config_map.insert(key.to_string(), value.to_string());
        }
    }

    fn load_from_env_vars(&mut self) {
        let env_mappings = [
            ("SOLKIT_LOG_LEVEL", KEY_LOG_LEVEL),
            ("SOLKIT_DEFAULT_NETWORK", KEY_DEFAULT_NETWORK),
            ("SOLKIT_COMMITMENT", KEY_COMMITMENT),
            ("SOLKIT_RPC_TIMEOUT", KEY_RPC_TIMEOUT_SECONDS),
            ("SOLKIT_CONFIRM_TIMEOUT", KEY_CONFIRM_TIMEOUT_SECONDS),
            ("SOLKIT_CONFIRM_POLL_MILLIS", KEY_CONFIRM_POLL_MILLIS),
            ("SOLKIT_BALANCE_POLL", KEY_BALANCE_POLL_SECONDS),
            ("SOLKIT_HISTORY_LIMIT", KEY_HISTORY_LIMIT),
            ("SOLKIT_EXPLORER_HOST", KEY_EXPLORER_HOST),
            ("SOLKIT_FAIL_FAST", KEY_FAIL_FAST_ON_NETWORK),
        ];

        for (env_var, config_key) in &env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                if value.trim().is_empty() {
                    log::warn!("Environment variable {} is empty", env_var);
                    continue;
                }

                if value.chars().any(|c| c.is_control()) {
                    log::warn!(
                        "Environment variable {} contains control characters, ignoring",
                        env_var
                    );
                    continue;
                }

                self.config_map.insert(config_key.to_string(), value);
                log::debug!(
                    "Loaded setting {} from environment variable {}",
                    config_key,
                    env_var
                );
            }
        }
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}

fn parse_bool_flag(value: &str, key: &str) -> WalletResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(WalletError::ValidationError(format!(
            "Invalid boolean value '{}' for key '{}'",
            value, key
        ))),
    }
}

fn parse_u32_value(value: &str, key: &str) -> WalletResult<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalletError::ValidationError(format!(
            "Setting '{}' cannot be empty",
            key
        )));
    }

    trimmed.parse::<u32>().map_err(|_| {
        WalletError::ValidationError(format!(
            "Invalid numeric value '{}' for key '{}'",
            value, key
        ))
    })
}

static SETTINGS: OnceCell<WalletSettings> = OnceCell::new();

/// Initialise the process-wide settings once; later calls return the first instance.
pub fn init_settings_from_env() -> WalletResult<&'static WalletSettings> {
    SETTINGS.get_or_try_init(|| {
        let settings = WalletSettings::from_env()?;
        log::info!(
            "Wallet settings initialized for {:?} environment",
            settings.environment
        );
        Ok(settings)
    })
}
