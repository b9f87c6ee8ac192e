use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use foodbank_wallet_lib::crypto::verify_signature;
use foodbank_wallet_lib::{
    Account, AddTrustlineRequest, Address, Asset, Balance, CategoryAllocation, FileMarkerStore,
    LedgerClient, LedgerKeypair, LocalKeypairBridge, MarkerStore, Network, Operation, PlanDraft,
    ProviderRegistry, SendPaymentRequest, StubDashboardSource, SubmissionResult,
    TransactionEnvelope, WalletContext, WalletError, WalletPaths, WalletProvider, WalletResult,
};
use tempfile::TempDir;

const ISSUER: &str = "GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5";
const DESTINATION: &str = "GCFIRY65OQE7DFP5KLNS2PF2LVZMUZYJX4OZIEQ36N2IQANUB5XVYOJR";

/// In-memory ledger that only accepts correctly signed, correctly sequenced envelopes.
struct RecordingLedger {
    account: RefCell<Account>,
    submitted: RefCell<Vec<TransactionEnvelope>>,
}

impl RecordingLedger {
    fn new(address: Address) -> Self {
        Self {
            account: RefCell::new(Account {
                address,
                sequence: 100,
                balances: vec![Balance {
                    asset: Asset::Native,
                    balance: "250.0000000".to_string(),
                }],
            }),
            submitted: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl LedgerClient for RecordingLedger {
    async fn load_account(&self, address: &Address) -> WalletResult<Account> {
        let account = self.account.borrow();
        if account.address != *address {
            return Err(WalletError::NetworkError("HTTP 404 Resource Missing".to_string()));
        }
        Ok(account.clone())
    }

    async fn submit_transaction(&self, signed_envelope_xdr: &str) -> WalletResult<SubmissionResult> {
        let envelope = TransactionEnvelope::from_base64(signed_envelope_xdr)?;
        let hash = envelope
            .transaction
            .signature_hash(Network::Testnet.passphrase());

        let mut account = self.account.borrow_mut();
        let signed = envelope.signatures.iter().any(|signature| {
            verify_signature(&account.address, &hash, &signature.signature).unwrap_or(false)
        });
        if !signed {
            return Err(WalletError::NetworkError("tx_bad_auth".to_string()));
        }
        if envelope.transaction.sequence != account.sequence + 1 {
            return Err(WalletError::NetworkError("tx_bad_seq".to_string()));
        }
        account.sequence += 1;

        self.submitted.borrow_mut().push(envelope);
        Ok(SubmissionResult {
            hash: hex::encode(hash),
            ledger: 1_000 + self.submitted.borrow().len() as u32,
            successful: true,
            envelope_xdr: Some(signed_envelope_xdr.to_string()),
            result_xdr: None,
        })
    }
}

fn local_registry(keypair: LedgerKeypair, network: Network) -> ProviderRegistry {
    ProviderRegistry::new().with(
        WalletProvider::LocalKeypair,
        Rc::new(LocalKeypairBridge::new(keypair, network)),
    )
}

#[tokio::test]
async fn connect_pay_trust_and_disconnect_flow() -> anyhow::Result<()> {
    std::env::set_var("FOODBANK_WALLET_ENV", "test");
    let temp_dir = TempDir::new()?;
    let paths = WalletPaths::new(temp_dir.path())?;

    let keypair = LedgerKeypair::generate();
    let address = keypair.address().clone();
    let ledger = Rc::new(RecordingLedger::new(address.clone()));
    let markers = Rc::new(FileMarkerStore::from_paths(&paths));

    let context = WalletContext::with_components(
        paths,
        local_registry(keypair, Network::Testnet),
        ledger.clone(),
        markers.clone(),
        Rc::new(StubDashboardSource),
    )?;
    assert!(!context.status().previously_connected);

    let connected = context.connect("local").await.map_err(anyhow::Error::msg)?;
    assert_eq!(connected.address, address.to_string());
    assert_eq!(markers.get("walletConnected")?, Some("true".to_string()));

    let balance = context.refresh_balance().await.map_err(anyhow::Error::msg)?;
    assert_eq!(balance.balance, "250.0000000");

    let payment = context
        .send_payment(&SendPaymentRequest {
            destination: DESTINATION.to_string(),
            amount: "12.5".to_string(),
        })
        .await
        .map_err(anyhow::Error::msg)?;
    assert!(payment.successful);

    let trustline = context
        .add_trustline(&AddTrustlineRequest {
            asset_code: "FOOD".to_string(),
            issuer: ISSUER.to_string(),
        })
        .await
        .map_err(anyhow::Error::msg)?;
    assert!(trustline.successful);
    assert_ne!(payment.hash, trustline.hash);

    {
        let submitted = ledger.submitted.borrow();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].transaction.sequence, 101);
        assert_eq!(submitted[1].transaction.sequence, 102);
        assert!(matches!(
            submitted[1].transaction.operations[0],
            Operation::ChangeTrust { .. }
        ));
    }

    let snapshot = context.refresh_dashboard().await.map_err(anyhow::Error::msg)?;
    assert!(snapshot.inventory.is_empty());

    let plan = context
        .save_plan(&PlanDraft {
            date: chrono::NaiveDate::from_ymd_opt(2024, 4, 2),
            location: "Westside Pantry".to_string(),
            expected_clients: 45,
            allocations: Vec::new(),
        })
        .map_err(anyhow::Error::msg)?;
    assert_eq!(context.dashboard().snapshot().plans, vec![plan]);

    let disconnected = context.disconnect().await.map_err(anyhow::Error::msg)?;
    assert!(disconnected.success);
    assert_eq!(markers.get("walletConnected")?, None);

    let notice = context.refresh_balance().await.unwrap_err();
    assert_eq!(notice.code, "NOT_CONNECTED");

    std::env::remove_var("FOODBANK_WALLET_ENV");
    Ok(())
}

#[tokio::test]
async fn over_allocated_plan_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let paths = WalletPaths::new(temp_dir.path())?;
    let keypair = LedgerKeypair::generate();
    let ledger = Rc::new(RecordingLedger::new(keypair.address().clone()));

    let context = WalletContext::with_components(
        paths.clone(),
        local_registry(keypair, Network::Testnet),
        ledger,
        Rc::new(FileMarkerStore::from_paths(&paths)),
        Rc::new(StubDashboardSource),
    )?;
    context.refresh_dashboard().await.map_err(anyhow::Error::msg)?;

    let notice = context
        .save_plan(&PlanDraft {
            date: chrono::NaiveDate::from_ymd_opt(2024, 4, 2),
            location: "Westside Pantry".to_string(),
            expected_clients: 45,
            allocations: vec![CategoryAllocation::new("Canned Goods", 1)],
        })
        .unwrap_err();
    assert_eq!(notice.message, "Validation failed: Canned Goods");
    assert!(context.dashboard().snapshot().plans.is_empty());
    Ok(())
}

#[tokio::test]
async fn bridge_on_wrong_network_cannot_connect() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let paths = WalletPaths::new(temp_dir.path())?;
    let keypair = LedgerKeypair::generate();
    let ledger = Rc::new(RecordingLedger::new(keypair.address().clone()));
    let markers = Rc::new(FileMarkerStore::from_paths(&paths));

    let context = WalletContext::with_components(
        paths,
        local_registry(keypair, Network::Public),
        ledger,
        markers.clone(),
        Rc::new(StubDashboardSource),
    )?;

    let notice = context.connect("local").await.unwrap_err();
    assert_eq!(notice.code, "NETWORK_MISMATCH");
    assert!(!context.session().is_connected());
    assert_eq!(markers.get("walletConnected")?, None);
    Ok(())
}
