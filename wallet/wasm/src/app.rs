use std::rc::Rc;

use foodbank_wallet_lib::{
    guarded, ActionFlags, BalanceResponse, DashboardPresenter, DisconnectResponse, HorizonClient,
    LedgerClient, MarkerStore, Network, PlanDraft, ProviderRegistry, SessionSettings,
    StubDashboardSource, SubmissionResponse, Timeframe, WalletError, WalletProvider, WalletSession,
    WalletStatusResponse,
};
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::freighter::FreighterBridge;
use crate::local_storage::LocalStorageMarker;
use crate::{js_to_rust, notice_to_js, rust_to_js};

/// UI root for the browser build; owns the session and the dashboard.
///
/// Every async method returns a promise resolving to a plain object, or
/// rejecting with `{ code, message }`.
#[wasm_bindgen]
pub struct WalletApp {
    session: Rc<WalletSession>,
    dashboard: Rc<DashboardPresenter>,
    flags: Rc<ActionFlags>,
}

#[wasm_bindgen]
impl WalletApp {
    /// Create the app against the test network, optionally with a custom Horizon URL
    #[wasm_bindgen(constructor)]
    pub fn new(horizon_url: Option<String>) -> Result<WalletApp, JsValue> {
        let settings = SessionSettings::default();
        let horizon_url =
            horizon_url.unwrap_or_else(|| settings.network.default_horizon_url().to_string());
        let ledger: Rc<dyn LedgerClient> =
            Rc::new(HorizonClient::new(horizon_url).map_err(into_js)?);
        let markers: Rc<dyn MarkerStore> = Rc::new(LocalStorageMarker);
        let registry = ProviderRegistry::new()
            .with(WalletProvider::Freighter, Rc::new(FreighterBridge::default()));

        Ok(WalletApp {
            session: Rc::new(WalletSession::new(settings, registry, ledger, markers)),
            dashboard: Rc::new(DashboardPresenter::new(Rc::new(StubDashboardSource))),
            flags: Rc::new(ActionFlags::default()),
        })
    }

    /// Connect through the named wallet provider
    pub fn connect(&self, provider: String) -> Promise {
        let session = self.session.clone();
        let flags = self.flags.clone();
        future_to_promise(async move {
            let response = guarded(&flags.connect, "connect", session.connect(&provider))
                .await
                .map_err(notice_to_js)?;
            rust_to_js(&response)
        })
    }

    #[wasm_bindgen(js_name = getBalance)]
    pub fn get_balance(&self) -> Promise {
        let session = self.session.clone();
        let flags = self.flags.clone();
        future_to_promise(async move {
            let response = guarded(&flags.balance, "balance", async {
                let balance = session.get_balance().await?;
                let address = session.address().ok_or(WalletError::NotConnected)?;
                Ok::<_, WalletError>(BalanceResponse {
                    address: address.to_string(),
                    balance,
                })
            })
            .await
            .map_err(notice_to_js)?;
            rust_to_js(&response)
        })
    }

    #[wasm_bindgen(js_name = sendPayment)]
    pub fn send_payment(&self, destination: String, amount: String) -> Promise {
        let session = self.session.clone();
        let flags = self.flags.clone();
        future_to_promise(async move {
            let response = guarded(&flags.payment, "payment", async {
                session
                    .send_payment(&destination, &amount)
                    .await
                    .map(SubmissionResponse::from)
            })
            .await
            .map_err(notice_to_js)?;
            rust_to_js(&response)
        })
    }

    #[wasm_bindgen(js_name = addTrustline)]
    pub fn add_trustline(&self, asset_code: String, issuer: String) -> Promise {
        let session = self.session.clone();
        let flags = self.flags.clone();
        future_to_promise(async move {
            let response = guarded(&flags.trustline, "trustline", async {
                session
                    .add_trustline(&asset_code, &issuer)
                    .await
                    .map(SubmissionResponse::from)
            })
            .await
            .map_err(notice_to_js)?;
            rust_to_js(&response)
        })
    }

    pub fn disconnect(&self) -> Promise {
        let session = self.session.clone();
        let flags = self.flags.clone();
        future_to_promise(async move {
            let response = guarded(&flags.disconnect, "disconnect", async {
                let success = session.disconnect().await?;
                Ok::<_, WalletError>(DisconnectResponse { success })
            })
            .await
            .map_err(notice_to_js)?;
            rust_to_js(&response)
        })
    }

    pub fn status(&self) -> Result<JsValue, JsValue> {
        let previously_connected = self.session.was_previously_connected().unwrap_or(false);
        rust_to_js(&WalletStatusResponse {
            state: self.session.state(),
            network: self.session.network().name().to_string(),
            previously_connected,
        })
    }

    pub fn loading(&self) -> Result<JsValue, JsValue> {
        rust_to_js(&self.flags.state(self.dashboard.is_loading()))
    }

    #[wasm_bindgen(js_name = refreshDashboard)]
    pub fn refresh_dashboard(&self) -> Promise {
        let dashboard = self.dashboard.clone();
        future_to_promise(async move {
            let snapshot = dashboard.refresh().await.map_err(into_js)?;
            rust_to_js(&snapshot)
        })
    }

    #[wasm_bindgen(js_name = setTimeframe)]
    pub fn set_timeframe(&self, timeframe: &str) -> Result<(), JsValue> {
        let timeframe = timeframe.parse::<Timeframe>().map_err(into_js)?;
        self.dashboard.set_timeframe(timeframe);
        Ok(())
    }

    pub fn timeframe(&self) -> String {
        self.dashboard.timeframe().to_string()
    }

    /// `[category, quantity]` pairs, standard categories first
    #[wasm_bindgen(js_name = categoryTotals)]
    pub fn category_totals(&self) -> Result<JsValue, JsValue> {
        rust_to_js(&self.dashboard.category_totals())
    }

    /// Validate a plan draft against the loaded inventory and record it
    #[wasm_bindgen(js_name = savePlan)]
    pub fn save_plan(&self, draft: JsValue) -> Result<JsValue, JsValue> {
        let draft: PlanDraft = js_to_rust(&draft)?;
        let dashboard = &self.dashboard;
        let plan = dashboard
            .plan_form()
            .submit(&draft, |plan| {
                dashboard.record_plan(plan.clone());
                Ok(())
            })
            .map_err(into_js)?;
        rust_to_js(&plan)
    }

    #[wasm_bindgen(js_name = expectedNetwork)]
    pub fn expected_network() -> String {
        Network::default().name().to_string()
    }
}

fn into_js(error: WalletError) -> JsValue {
    log::error!("{}", error);
    notice_to_js(error.into())
}
