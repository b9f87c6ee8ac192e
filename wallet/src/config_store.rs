use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::Network;
use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;
use crate::transaction::{BASE_FEE, DEFAULT_TIMEOUT_SECS};

const CONFIG_VERSION: u16 = 1;

/// Environment variable selecting the configuration environment name.
pub const ENVIRONMENT_VAR: &str = "FOODBANK_WALLET_ENV";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: Network,
    pub horizon_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            horizon_url: Network::Testnet.default_horizon_url().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Fee per operation, in stroops.
    pub base_fee: u32,
    /// Validity window attached to every built transaction.
    pub validity_window_secs: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            base_fee: BASE_FEE,
            validity_window_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub connected_marker_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connected_marker_key: "walletConnected".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    pub transactions: TransactionConfig,
    pub storage: StorageConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            transactions: TransactionConfig::default(),
            storage: StorageConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.network.horizon_url.trim().is_empty() {
            return Err(WalletError::ConfigError(
                "Horizon URL cannot be empty".to_string(),
            ));
        }
        if self.transactions.base_fee == 0 {
            return Err(WalletError::ConfigError(
                "Base fee must be positive".to_string(),
            ));
        }
        if self.transactions.validity_window_secs == 0 {
            return Err(WalletError::ConfigError(
                "Transactions need a validity window".to_string(),
            ));
        }
        if self.storage.connected_marker_key.trim().is_empty() {
            return Err(WalletError::ConfigError(
                "Marker key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| WalletError::ConfigError(format!("Unreadable config: {}", e)))?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ConfigError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        let checksum = checksum(&envelope.payload)?;
        if checksum != envelope.checksum {
            return Err(WalletError::ConfigError(
                "Config integrity verification failed".to_string(),
            ));
        }

        envelope.payload.validate()?;
        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        config.validate()?;
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| WalletError::ConfigError(e.to_string()))?;
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
        log::debug!("Saved wallet config to {}", self.path.display());
        Ok(())
    }

    pub fn update<F>(
        &self,
        environment: impl Into<String>,
        updater: F,
    ) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let encoded =
        serde_json::to_vec(config).map_err(|e| WalletError::ConfigError(e.to_string()))?;
    let mut hasher = Blake3::new();
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wallet.config");
        let store = ConfigStore::new(&path);

        let mut config = WalletConfig::new("development");
        config.network.horizon_url = "http://localhost:8000".into();
        config.transactions.validity_window_secs = 120;
        store.save(&config).unwrap();

        let loaded = store.load_or_default("development").unwrap();
        assert_eq!(loaded.network.horizon_url, "http://localhost:8000");
        assert_eq!(loaded.transactions.validity_window_secs, 120);
    }

    #[test]
    fn missing_config_is_created_with_defaults() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("wallet.config"));
        let config = store.load_or_default("test").unwrap();
        assert_eq!(config.network.network, Network::Testnet);
        assert_eq!(config.transactions.base_fee, 100);
        assert_eq!(config.transactions.validity_window_secs, 30);
        assert_eq!(config.storage.connected_marker_key, "walletConnected");
        assert!(store.path().exists());
    }

    #[test]
    fn tampered_config_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wallet.config");
        let store = ConfigStore::new(&path);
        store.save(&WalletConfig::new("test")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let tampered = contents.replace("horizon-testnet", "horizon-evil");
        assert_ne!(contents, tampered);
        fs::write(&path, tampered).unwrap();

        let result = store.load_or_default("test");
        assert!(matches!(result, Err(WalletError::ConfigError(_))));
    }

    #[test]
    fn update_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("wallet.config"));
        let result = store.update("test", |config| {
            config.transactions.base_fee = 0;
            Ok(())
        });
        assert!(matches!(result, Err(WalletError::ConfigError(_))));
        assert_eq!(store.load_or_default("test").unwrap().transactions.base_fee, 100);
    }
}
