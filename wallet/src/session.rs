use std::rc::Rc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::api::types::ConnectResponse;
use crate::blockchain::{Account, Address, Asset, Network};
use crate::blockchain_client::{LedgerClient, SubmissionResult};
use crate::bridge::{SignOptions, WalletExtensionBridge};
use crate::config_store::WalletConfig;
use crate::errors::{TransactionStage, WalletError, WalletResult};
use crate::provider::{ProviderRegistry, WalletProvider};
use crate::storage::MarkerStore;
use crate::transaction::{Operation, TransactionBuilder, BASE_FEE, DEFAULT_TIMEOUT_SECS};
use crate::validation::InputValidator;

/// Value stored under the connected marker.
const CONNECTED_MARKER_VALUE: &str = "true";

/// Settings a session is created with, usually taken from [`WalletConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Network the wallet extension must be pointed at.
    pub network: Network,
    pub base_fee: u32,
    pub validity_window_secs: u64,
    pub marker_key: String,
}

impl SessionSettings {
    pub fn from_config(config: &WalletConfig) -> Self {
        Self {
            network: config.network.network,
            base_fee: config.transactions.base_fee,
            validity_window_secs: config.transactions.validity_window_secs,
            marker_key: config.storage.connected_marker_key.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            base_fee: BASE_FEE,
            validity_window_secs: DEFAULT_TIMEOUT_SECS,
            marker_key: "walletConnected".to_string(),
        }
    }
}

/// Details held while the session is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedSession {
    pub provider: WalletProvider,
    pub address: Address,
    /// Raw ed25519 key, hex encoded.
    pub public_key: String,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(ConnectedSession),
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    bridge: Option<Rc<dyn WalletExtensionBridge>>,
    /// Bumped by every connect and disconnect; a handshake only commits
    /// while its generation is still current.
    generation: u64,
}

struct ActiveConnection {
    session: ConnectedSession,
    bridge: Rc<dyn WalletExtensionBridge>,
}

/// Connection lifecycle and ledger operations for one browser tab.
///
/// Every operation other than `connect` is rejected with
/// [`WalletError::NotConnected`] before any bridge or ledger call when no
/// account is connected. The state lock is never held across an await.
pub struct WalletSession {
    settings: SessionSettings,
    registry: ProviderRegistry,
    ledger: Rc<dyn LedgerClient>,
    markers: Rc<dyn MarkerStore>,
    inner: RwLock<SessionInner>,
}

impl WalletSession {
    pub fn new(
        settings: SessionSettings,
        registry: ProviderRegistry,
        ledger: Rc<dyn LedgerClient>,
        markers: Rc<dyn MarkerStore>,
    ) -> Self {
        Self {
            settings,
            registry,
            ledger,
            markers,
            inner: RwLock::new(SessionInner::default()),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.inner.read().state, SessionState::Connected(_))
    }

    pub fn address(&self) -> Option<Address> {
        match &self.inner.read().state {
            SessionState::Connected(session) => Some(session.address.clone()),
            _ => None,
        }
    }

    /// Network the session expects, or is connected on.
    pub fn network(&self) -> Network {
        match &self.inner.read().state {
            SessionState::Connected(session) => session.network,
            _ => self.settings.network,
        }
    }

    /// Connect through the named provider.
    ///
    /// May open the extension's permission prompt. On any failure the session
    /// is left disconnected. A `disconnect` issued while the handshake is
    /// pending wins: the handshake result is dropped with
    /// [`WalletError::NotConnected`].
    pub async fn connect(&self, provider_name: &str) -> WalletResult<ConnectResponse> {
        let generation = self.begin_connect();

        match self.handshake(provider_name).await {
            Ok(active) => {
                let response = ConnectResponse {
                    address: active.session.address.to_string(),
                    public_key: active.session.public_key.clone(),
                };
                let address = active.session.address.clone();
                let provider = active.session.provider;
                let network = active.session.network;
                if !self.commit_connect(generation, active) {
                    log::warn!("Connection to {} via {} was superseded", address, provider);
                    return Err(WalletError::NotConnected);
                }
                log::info!("Connected {} via {} on {}", address, provider, network);

                if let Err(err) = self
                    .markers
                    .set(&self.settings.marker_key, CONNECTED_MARKER_VALUE)
                {
                    log::warn!("Failed to persist connected marker: {}", err);
                }
                Ok(response)
            }
            Err(err) => {
                self.abandon_connect(generation);
                log::error!("Wallet connection failed: {}", err);
                Err(err)
            }
        }
    }

    async fn handshake(&self, provider_name: &str) -> WalletResult<ActiveConnection> {
        let (provider, bridge) = self.registry.resolve(provider_name)?;

        if !bridge.is_connected().await.map_err(bridge_error)? {
            return Err(WalletError::ExtensionNotInstalled(provider.name().to_string()));
        }

        let reported = bridge.get_network().await.map_err(bridge_error)?;
        let expected = self.settings.network;
        match reported.parse::<Network>() {
            Ok(network) if network == expected => {}
            _ => {
                return Err(WalletError::NetworkMismatch {
                    expected: expected.name().to_string(),
                    actual: reported,
                })
            }
        }

        if !bridge.is_allowed().await.map_err(bridge_error)? {
            log::debug!("Requesting access from {}", provider);
            bridge.request_access().await.map_err(bridge_error)?;
        }

        let key = bridge
            .get_public_key()
            .await
            .map_err(|err| match err {
                WalletError::PermissionDenied(_) => err,
                other => WalletError::PermissionDenied(other.to_string()),
            })?;
        if key.trim().is_empty() {
            return Err(WalletError::PermissionDenied(
                "Wallet returned no public key".to_string(),
            ));
        }
        let address = Address::from_string(&key)
            .map_err(|err| WalletError::PermissionDenied(err.to_string()))?;

        Ok(ActiveConnection {
            session: ConnectedSession {
                provider,
                public_key: hex::encode(address.public_key_bytes()),
                address,
                network: expected,
            },
            bridge,
        })
    }

    /// Native balance of the connected account, exactly as the ledger reports it.
    pub async fn get_balance(&self) -> WalletResult<String> {
        let account = self.account().await?;
        Ok(account.native_balance().unwrap_or("0").to_string())
    }

    /// Fresh snapshot of the connected account.
    pub async fn account(&self) -> WalletResult<Account> {
        let active = self.active()?;
        self.ledger
            .load_account(&active.session.address)
            .await
            .map_err(|err| {
                log::error!("Failed to load account {}: {}", active.session.address, err);
                ledger_error(err)
            })
    }

    /// Send `amount` of the native asset to `destination`.
    pub async fn send_payment(
        &self,
        destination: &str,
        amount: &str,
    ) -> WalletResult<SubmissionResult> {
        let active = self.active()?;
        let operation = InputValidator::shared().and_then(|validator| {
            let destination = validator.validate_address(destination)?;
            let amount = validator.validate_amount(amount)?;
            Operation::payment(destination, Asset::Native, amount)
        });
        self.execute(active, operation, "payment").await
    }

    /// Open a trustline so the account can hold `asset_code` issued by `issuer`.
    pub async fn add_trustline(
        &self,
        asset_code: &str,
        issuer: &str,
    ) -> WalletResult<SubmissionResult> {
        let active = self.active()?;
        let operation = InputValidator::shared().and_then(|validator| {
            let code = validator.validate_asset_code(asset_code)?;
            let issuer = validator.validate_address(issuer)?;
            Operation::change_trust(Asset::credit(&code, issuer)?)
        });
        self.execute(active, operation, "trustline").await
    }

    /// Forget the connected account and clear the local marker.
    ///
    /// The extension's own permission grant is left in place.
    pub async fn disconnect(&self) -> WalletResult<bool> {
        {
            let mut inner = self.inner.write();
            inner.generation = inner.generation.wrapping_add(1);
            inner.state = SessionState::Disconnected;
            inner.bridge = None;
        }

        self.markers
            .remove(&self.settings.marker_key)
            .map_err(|err| {
                log::error!("Failed to clear connected marker: {}", err);
                match err {
                    WalletError::StorageError(_) => err,
                    other => WalletError::StorageError(other.to_string()),
                }
            })?;

        log::info!("Wallet disconnected");
        Ok(true)
    }

    /// Whether an earlier session left the connected marker behind.
    ///
    /// Only reports the marker; the session is never restored from it.
    pub fn was_previously_connected(&self) -> WalletResult<bool> {
        Ok(self.markers.get(&self.settings.marker_key)?.as_deref() == Some(CONNECTED_MARKER_VALUE))
    }

    async fn execute(
        &self,
        active: ActiveConnection,
        operation: WalletResult<Operation>,
        label: &str,
    ) -> WalletResult<SubmissionResult> {
        let result = self.sign_and_submit(&active, operation).await;
        match &result {
            Ok(submission) => log::info!(
                "Submitted {} {} from {} in ledger {}",
                label,
                submission.hash,
                active.session.address,
                submission.ledger
            ),
            Err(err) => log::error!("Failed to submit {}: {}", label, err),
        }
        result
    }

    async fn sign_and_submit(
        &self,
        active: &ActiveConnection,
        operation: WalletResult<Operation>,
    ) -> WalletResult<SubmissionResult> {
        let envelope = self
            .build_envelope(&active.session.address, operation)
            .await
            .map_err(|err| WalletError::transaction_failed(TransactionStage::Build, err))?;

        let options = SignOptions::for_network(active.session.network);
        let signed = active
            .bridge
            .sign_transaction(&envelope, &options)
            .await
            .map_err(|err| WalletError::transaction_failed(TransactionStage::Sign, err))?;

        let submission = self
            .ledger
            .submit_transaction(&signed)
            .await
            .map_err(|err| WalletError::transaction_failed(TransactionStage::Submit, err))?;

        if !submission.successful {
            return Err(WalletError::transaction_failed(
                TransactionStage::Submit,
                WalletError::InvalidResponse(format!(
                    "Transaction {} was not applied",
                    submission.hash
                )),
            ));
        }
        Ok(submission)
    }

    async fn build_envelope(
        &self,
        source: &Address,
        operation: WalletResult<Operation>,
    ) -> WalletResult<String> {
        let operation = operation?;
        let account = self.ledger.load_account(source).await.map_err(ledger_error)?;
        let transaction = TransactionBuilder::new(&account)?
            .base_fee(self.settings.base_fee)
            .timeout(self.settings.validity_window_secs)
            .add_operation(operation)
            .build()?;
        Ok(transaction.into_envelope().to_base64())
    }

    fn active(&self) -> WalletResult<ActiveConnection> {
        let inner = self.inner.read();
        match (&inner.state, &inner.bridge) {
            (SessionState::Connected(session), Some(bridge)) => Ok(ActiveConnection {
                session: session.clone(),
                bridge: Rc::clone(bridge),
            }),
            _ => Err(WalletError::NotConnected),
        }
    }

    fn begin_connect(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.generation = inner.generation.wrapping_add(1);
        inner.state = SessionState::Connecting;
        inner.bridge = None;
        inner.generation
    }

    fn commit_connect(&self, generation: u64, active: ActiveConnection) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.state = SessionState::Connected(active.session);
        inner.bridge = Some(active.bridge);
        true
    }

    fn abandon_connect(&self, generation: u64) {
        let mut inner = self.inner.write();
        if inner.generation == generation {
            inner.state = SessionState::Disconnected;
            inner.bridge = None;
        }
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("state", &self.inner.read().state)
            .finish()
    }
}

fn bridge_error(err: WalletError) -> WalletError {
    match err {
        WalletError::Bridge(_) | WalletError::PermissionDenied(_) => err,
        other => WalletError::Bridge(other.to_string()),
    }
}

fn ledger_error(err: WalletError) -> WalletError {
    match err {
        WalletError::NetworkError(_) => err,
        other => WalletError::NetworkError(other.to_string()),
    }
}
