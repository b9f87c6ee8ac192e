use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the native wallet front-end.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Directory holding local persistence markers.
    marker_dir: PathBuf,
    /// Path to persisted wallet configuration.
    config_file: PathBuf,
}

impl WalletPaths {
    pub const CONFIG_FILENAME: &'static str = "wallet.config";
    pub const MARKER_DIRNAME: &'static str = "markers";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            marker_dir: root_dir.join(Self::MARKER_DIRNAME),
            config_file: root_dir.join(Self::CONFIG_FILENAME),
            root_dir,
        })
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.marker_dir)?;
        Ok(())
    }

    pub fn marker_dir(&self) -> &Path {
        &self.marker_dir
    }

    /// Path to persisted wallet configuration file.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Root directory for all wallet-managed data.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wallet_paths_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path()).unwrap();

        assert_eq!(paths.marker_dir(), temp_dir.path().join("markers"));
        assert_eq!(paths.config_file(), temp_dir.path().join("wallet.config"));
    }

    #[test]
    fn test_empty_root_directory_rejected() {
        let result = WalletPaths::new("");
        match result {
            Err(WalletError::StorageError(msg)) => {
                assert!(msg.contains("cannot be empty"));
            }
            _ => panic!("Expected StorageError for empty root"),
        }
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path().join("nested")).unwrap();

        paths.ensure_directories().unwrap();

        assert!(paths.root_dir().exists());
        assert!(paths.marker_dir().exists());
    }
}
