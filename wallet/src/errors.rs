use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a payment or trustline submission failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStage {
    Build,
    Sign,
    Submit,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransactionStage::Build => write!(f, "build"),
            TransactionStage::Sign => write!(f, "sign"),
            TransactionStage::Submit => write!(f, "submit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalletError {
    // Session errors
    ExtensionNotInstalled(String),
    NetworkMismatch { expected: String, actual: String },
    PermissionDenied(String),
    NotConnected,
    Bridge(String),

    // Submission errors
    TransactionFailed {
        stage: TransactionStage,
        cause: Box<WalletError>,
    },

    // Network errors
    NetworkError(String),
    InvalidResponse(String),

    // Storage errors
    StorageError(String),
    ConfigError(String),

    // Validation errors
    ValidationFailed { field: String },
    InvalidAddress(String),
    InvalidAmount(String),
    InvalidAsset(String),

    CryptoError(String),

    // UI errors
    Busy,
}

impl WalletError {
    pub fn transaction_failed(stage: TransactionStage, cause: WalletError) -> Self {
        WalletError::TransactionFailed {
            stage,
            cause: Box::new(cause),
        }
    }

    pub fn validation_failed(field: impl Into<String>) -> Self {
        WalletError::ValidationFailed {
            field: field.into(),
        }
    }

    /// Stable identifier handed to the UI alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::ExtensionNotInstalled(_) => "EXTENSION_NOT_INSTALLED",
            WalletError::NetworkMismatch { .. } => "NETWORK_MISMATCH",
            WalletError::PermissionDenied(_) => "PERMISSION_DENIED",
            WalletError::NotConnected => "NOT_CONNECTED",
            WalletError::Bridge(_) => "BRIDGE_ERROR",
            WalletError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            WalletError::NetworkError(_) => "NETWORK_ERROR",
            WalletError::InvalidResponse(_) => "INVALID_RESPONSE",
            WalletError::StorageError(_) => "STORAGE_ERROR",
            WalletError::ConfigError(_) => "CONFIG_ERROR",
            WalletError::ValidationFailed { .. } => "VALIDATION_FAILED",
            WalletError::InvalidAddress(_) => "INVALID_ADDRESS",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::InvalidAsset(_) => "INVALID_ASSET",
            WalletError::CryptoError(_) => "CRYPTO_ERROR",
            WalletError::Busy => "BUSY",
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::ExtensionNotInstalled(provider) => {
                write!(f, "Wallet extension not installed: {}", provider)
            }
            WalletError::NetworkMismatch { expected, actual } => write!(
                f,
                "Wallet is on network {}, please switch to {}",
                actual, expected
            ),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            WalletError::NotConnected => write!(f, "Wallet not connected"),
            WalletError::Bridge(msg) => write!(f, "Wallet extension error: {}", msg),

            WalletError::TransactionFailed { stage, cause } => {
                write!(f, "Transaction failed during {}: {}", stage, cause)
            }

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),

            WalletError::ValidationFailed { field } => write!(f, "Validation failed: {}", field),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            WalletError::InvalidAsset(msg) => write!(f, "Invalid asset: {}", msg),

            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),

            WalletError::Busy => write!(f, "Another request is still in progress"),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! wallet_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::WalletError::$variant($msg.to_string())
    };
    ($variant:ident) => {
        $crate::errors::WalletError::$variant
    };
}

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                WalletError::StorageError(format!("Permission denied: {}", error))
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::InvalidResponse(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            WalletError::InvalidResponse(error.to_string())
        } else {
            WalletError::NetworkError(error.to_string())
        }
    }
}
