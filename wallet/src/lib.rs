// lib.rs - Core library structure for the wallet

pub mod api;
pub mod app_state;
pub mod blockchain;
pub mod blockchain_client;
pub mod bridge;
pub mod config_store;
pub mod crypto;
pub mod dashboard;
pub mod distribution;
pub mod errors;
pub mod loading;
pub mod provider;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export common types
pub use api::types::*;
pub use app_state::WalletContext;
pub use blockchain::{Account, Address, Amount, Asset, Balance, Network};
pub use blockchain_client::{HorizonClient, LedgerClient, SubmissionResult};
pub use bridge::{LocalKeypairBridge, SignOptions, WalletExtensionBridge};
pub use config_store::{ConfigStore, NetworkConfig, StorageConfig, TransactionConfig, WalletConfig};
pub use crypto::LedgerKeypair;
pub use dashboard::{
    is_standard_category, DashboardPresenter, DashboardSnapshot, DashboardSource, InventoryItem,
    Prediction, StubDashboardSource, Timeframe, FOOD_CATEGORIES,
};
pub use distribution::{CategoryAllocation, DistributionPlan, DistributionPlanForm, PlanDraft};
pub use errors::{TransactionStage, WalletError, WalletResult};
pub use loading::{guarded, ActionFlags, ActionResult, LoadingFlag, LoadingGuard, LoadingState};
pub use provider::{ProviderRegistry, WalletProvider};
pub use session::{ConnectedSession, SessionSettings, SessionState, WalletSession};
pub use storage::{FileMarkerStore, MarkerStore, MemoryMarkerStore, WalletPaths};
pub use transaction::{Operation, TransactionBuilder, TransactionEnvelope};
pub use validation::InputValidator;
