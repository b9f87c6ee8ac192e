use std::path::PathBuf;
use std::rc::Rc;

use crate::api::types::{
    AddTrustlineRequest, BalanceResponse, ConnectResponse, DisconnectResponse, ErrorNotice,
    SendPaymentRequest, SubmissionResponse, WalletStatusResponse,
};
use crate::blockchain_client::{HorizonClient, LedgerClient};
use crate::config_store::{ConfigStore, WalletConfig, ENVIRONMENT_VAR};
use crate::dashboard::{DashboardPresenter, DashboardSnapshot, DashboardSource, StubDashboardSource};
use crate::distribution::{DistributionPlan, PlanDraft};
use crate::errors::{WalletError, WalletResult};
use crate::loading::{guarded, ActionFlags, ActionResult, LoadingState};
use crate::provider::ProviderRegistry;
use crate::session::{SessionSettings, WalletSession};
use crate::storage::{FileMarkerStore, MarkerStore, WalletPaths};

/// UI root: owns configuration, the wallet session and the dashboard.
pub struct WalletContext {
    paths: WalletPaths,
    config_store: ConfigStore,
    config: WalletConfig,
    environment: String,
    registry: ProviderRegistry,
    markers: Rc<dyn MarkerStore>,
    session: WalletSession,
    dashboard: DashboardPresenter,
    flags: ActionFlags,
}

impl WalletContext {
    /// Context backed by Horizon, on-disk markers and the stub dashboard source.
    pub fn initialize(root_dir: PathBuf, registry: ProviderRegistry) -> WalletResult<Self> {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_or_default(environment.clone())?;
        let ledger: Rc<dyn LedgerClient> =
            Rc::new(HorizonClient::new(config.network.horizon_url.clone())?);
        let markers: Rc<dyn MarkerStore> = Rc::new(FileMarkerStore::from_paths(&paths));

        log::info!(
            "Wallet context ready for {} ({}) at {}",
            config.network.network,
            environment,
            paths.root_dir().display()
        );

        Ok(Self::assemble(
            paths,
            config_store,
            config,
            environment,
            registry,
            ledger,
            markers,
            Rc::new(StubDashboardSource),
        ))
    }

    /// Context with caller-supplied collaborators.
    pub fn with_components(
        paths: WalletPaths,
        registry: ProviderRegistry,
        ledger: Rc<dyn LedgerClient>,
        markers: Rc<dyn MarkerStore>,
        source: Rc<dyn DashboardSource>,
    ) -> WalletResult<Self> {
        paths.ensure_directories()?;
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_or_default(environment.clone())?;
        Ok(Self::assemble(
            paths,
            config_store,
            config,
            environment,
            registry,
            ledger,
            markers,
            source,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        paths: WalletPaths,
        config_store: ConfigStore,
        config: WalletConfig,
        environment: String,
        registry: ProviderRegistry,
        ledger: Rc<dyn LedgerClient>,
        markers: Rc<dyn MarkerStore>,
        source: Rc<dyn DashboardSource>,
    ) -> Self {
        let session = WalletSession::new(
            SessionSettings::from_config(&config),
            registry.clone(),
            ledger,
            markers.clone(),
        );
        Self {
            paths,
            config_store,
            config,
            environment,
            registry,
            markers,
            session,
            dashboard: DashboardPresenter::new(source),
            flags: ActionFlags::default(),
        }
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn dashboard(&self) -> &DashboardPresenter {
        &self.dashboard
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn paths(&self) -> &WalletPaths {
        &self.paths
    }

    /// Persist a config change and rebuild the session from it.
    ///
    /// The rebuilt session starts disconnected.
    pub fn update_config<F>(&mut self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let updated = self
            .config_store
            .update(self.environment.clone(), updater)?;
        let ledger: Rc<dyn LedgerClient> =
            Rc::new(HorizonClient::new(updated.network.horizon_url.clone())?);
        self.session = WalletSession::new(
            SessionSettings::from_config(&updated),
            self.registry.clone(),
            ledger,
            self.markers.clone(),
        );
        self.config = updated.clone();
        Ok(updated)
    }

    pub fn loading(&self) -> LoadingState {
        self.flags.state(self.dashboard.is_loading())
    }

    pub fn status(&self) -> WalletStatusResponse {
        let previously_connected = self.session.was_previously_connected().unwrap_or_else(|err| {
            log::warn!("Could not read connected marker: {}", err);
            false
        });
        WalletStatusResponse {
            state: self.session.state(),
            network: self.session.network().name().to_string(),
            previously_connected,
        }
    }

    pub async fn connect(&self, provider: &str) -> ActionResult<ConnectResponse> {
        guarded(&self.flags.connect, "connect", self.session.connect(provider)).await
    }

    pub async fn refresh_balance(&self) -> ActionResult<BalanceResponse> {
        guarded(&self.flags.balance, "balance", async {
            let balance = self.session.get_balance().await?;
            let address = self.session.address().ok_or(WalletError::NotConnected)?;
            Ok::<_, WalletError>(BalanceResponse {
                address: address.to_string(),
                balance,
            })
        })
        .await
    }

    pub async fn send_payment(&self, request: &SendPaymentRequest) -> ActionResult<SubmissionResponse> {
        guarded(&self.flags.payment, "payment", async {
            self.session
                .send_payment(&request.destination, &request.amount)
                .await
                .map(SubmissionResponse::from)
        })
        .await
    }

    pub async fn add_trustline(
        &self,
        request: &AddTrustlineRequest,
    ) -> ActionResult<SubmissionResponse> {
        guarded(&self.flags.trustline, "trustline", async {
            self.session
                .add_trustline(&request.asset_code, &request.issuer)
                .await
                .map(SubmissionResponse::from)
        })
        .await
    }

    pub async fn disconnect(&self) -> ActionResult<DisconnectResponse> {
        guarded(&self.flags.disconnect, "disconnect", async {
            let success = self.session.disconnect().await?;
            Ok::<_, WalletError>(DisconnectResponse { success })
        })
        .await
    }

    pub async fn refresh_dashboard(&self) -> ActionResult<DashboardSnapshot> {
        self.dashboard.refresh().await.map_err(ErrorNotice::from)
    }

    /// Validate the draft against current inventory and record the plan.
    pub fn save_plan(&self, draft: &PlanDraft) -> ActionResult<DistributionPlan> {
        let mut form = self.dashboard.plan_form();
        form.submit(draft, |plan| {
            self.dashboard.record_plan(plan.clone());
            Ok(())
        })
        .map_err(ErrorNotice::from)
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("root", &self.paths.root_dir())
            .field("environment", &self.environment)
            .field("session", &self.session)
            .field("loading", &self.loading())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Network;
    use crate::bridge::LocalKeypairBridge;
    use crate::crypto::LedgerKeypair;
    use crate::provider::WalletProvider;
    use tempfile::TempDir;

    fn local_registry() -> ProviderRegistry {
        ProviderRegistry::new().with(
            WalletProvider::LocalKeypair,
            Rc::new(LocalKeypairBridge::pre_authorized(
                LedgerKeypair::generate(),
                Network::Testnet,
            )),
        )
    }

    #[test]
    fn initialize_creates_config_and_markers_dir() {
        let temp = TempDir::new().unwrap();
        let context = WalletContext::initialize(temp.path().join("wallet"), local_registry()).unwrap();

        assert!(context.paths().config_file().exists());
        assert!(context.paths().marker_dir().exists());
        assert_eq!(context.config().network.network, Network::Testnet);
        assert!(!context.session().is_connected());
        assert!(!context.status().previously_connected);
    }

    #[test]
    fn config_update_rebuilds_session() {
        let temp = TempDir::new().unwrap();
        let mut context = WalletContext::initialize(temp.path().to_path_buf(), local_registry()).unwrap();

        context
            .update_config(|config| {
                config.network.network = Network::Public;
                config.network.horizon_url = Network::Public.default_horizon_url().to_string();
                Ok(())
            })
            .unwrap();

        assert_eq!(context.session().network(), Network::Public);
        assert_eq!(context.status().network, "PUBLIC");
    }

    #[tokio::test]
    async fn failures_become_notices_and_clear_loading() {
        let temp = TempDir::new().unwrap();
        let context = WalletContext::initialize(temp.path().to_path_buf(), local_registry()).unwrap();

        let notice = context.refresh_balance().await.unwrap_err();
        assert_eq!(notice.code, "NOT_CONNECTED");
        assert_eq!(notice.message, "Wallet not connected");

        let notice = context.connect("freighter").await.unwrap_err();
        assert_eq!(notice.code, "EXTENSION_NOT_INSTALLED");
        assert_eq!(context.loading(), LoadingState::default());
    }

    #[test]
    fn invalid_plan_is_reported_by_field() {
        let temp = TempDir::new().unwrap();
        let context = WalletContext::initialize(temp.path().to_path_buf(), local_registry()).unwrap();

        let notice = context.save_plan(&PlanDraft::default()).unwrap_err();
        assert_eq!(notice.code, "VALIDATION_FAILED");
        assert_eq!(notice.message, "Validation failed: date");
    }
}
