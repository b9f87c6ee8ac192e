//! Narrow interface to the wallet extension that owns the user's keys.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::blockchain::Network;
use crate::crypto::LedgerKeypair;
use crate::errors::{WalletError, WalletResult};
use crate::transaction::TransactionEnvelope;

/// Network scope handed to the signer with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOptions {
    pub network: Network,
    pub network_passphrase: String,
}

impl SignOptions {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            network_passphrase: network.passphrase().to_string(),
        }
    }
}

/// Capability interface every wallet provider implements.
///
/// All calls may reject; rejections surface as [`WalletError::Bridge`]
/// unless a more specific variant applies.
#[async_trait(?Send)]
pub trait WalletExtensionBridge {
    /// Whether the extension is present and responding.
    async fn is_connected(&self) -> WalletResult<bool>;

    /// Whether this site already holds the user's permission.
    async fn is_allowed(&self) -> WalletResult<bool>;

    /// Ask the user for permission. Opens the extension's own UI.
    async fn request_access(&self) -> WalletResult<()>;

    /// Network name the extension is currently pointed at.
    async fn get_network(&self) -> WalletResult<String>;

    async fn get_public_key(&self) -> WalletResult<String>;

    /// Sign a base64 XDR envelope, returning the signed envelope.
    async fn sign_transaction(&self, envelope_xdr: &str, options: &SignOptions)
        -> WalletResult<String>;
}

/// In-process signer holding a keypair; stands in for an extension in
/// headless runs and tests.
#[derive(Debug)]
pub struct LocalKeypairBridge {
    keypair: LedgerKeypair,
    network: Network,
    allowed: RwLock<bool>,
}

impl LocalKeypairBridge {
    pub fn new(keypair: LedgerKeypair, network: Network) -> Self {
        Self {
            keypair,
            network,
            allowed: RwLock::new(false),
        }
    }

    /// Bridge that starts out with permission already granted.
    pub fn pre_authorized(keypair: LedgerKeypair, network: Network) -> Self {
        let bridge = Self::new(keypair, network);
        *bridge.allowed.write() = true;
        bridge
    }

    pub fn keypair(&self) -> &LedgerKeypair {
        &self.keypair
    }
}

#[async_trait(?Send)]
impl WalletExtensionBridge for LocalKeypairBridge {
    async fn is_connected(&self) -> WalletResult<bool> {
        Ok(true)
    }

    async fn is_allowed(&self) -> WalletResult<bool> {
        Ok(*self.allowed.read())
    }

    async fn request_access(&self) -> WalletResult<()> {
        *self.allowed.write() = true;
        Ok(())
    }

    async fn get_network(&self) -> WalletResult<String> {
        Ok(self.network.name().to_string())
    }

    async fn get_public_key(&self) -> WalletResult<String> {
        if !*self.allowed.read() {
            return Err(WalletError::PermissionDenied(
                "Site has not been granted access".to_string(),
            ));
        }
        Ok(self.keypair.address().to_string())
    }

    async fn sign_transaction(
        &self,
        envelope_xdr: &str,
        options: &SignOptions,
    ) -> WalletResult<String> {
        if !*self.allowed.read() {
            return Err(WalletError::PermissionDenied(
                "Site has not been granted access".to_string(),
            ));
        }

        if options.network != self.network
            || options.network_passphrase != self.network.passphrase()
        {
            return Err(WalletError::NetworkMismatch {
                expected: options.network.name().to_string(),
                actual: self.network.name().to_string(),
            });
        }

        let mut envelope = TransactionEnvelope::from_base64(envelope_xdr)
            .map_err(|e| WalletError::Bridge(e.to_string()))?;
        if envelope.transaction.source != *self.keypair.address() {
            return Err(WalletError::Bridge(
                "Transaction source does not match the active account".to_string(),
            ));
        }

        let hash = envelope
            .transaction
            .signature_hash(&options.network_passphrase);
        envelope.add_signature(self.keypair.address(), self.keypair.sign(&hash))?;
        log::debug!(
            "Signed transaction {} for {}",
            hex::encode(hash),
            self.keypair.address()
        );
        Ok(envelope.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Account, Address, Amount, Asset};
    use crate::crypto::verify_signature;
    use crate::transaction::{Operation, TransactionBuilder};

    const SECRET: &str = "SAVCUKRKFIVCUKRKFIVCUKRKFIVCUKRKFIVCUKRKFIVCUKRKFIVCVLG5";
    const DESTINATION: &str = "GCFIRY65OQE7DFP5KLNS2PF2LVZMUZYJX4OZIEQ36N2IQANUB5XVYOJR";

    fn unsigned_envelope(source: &Address) -> String {
        let account = Account {
            address: source.clone(),
            sequence: 1,
            balances: Vec::new(),
        };
        TransactionBuilder::new(&account)
            .unwrap()
            .add_operation(
                Operation::payment(
                    Address::from_string(DESTINATION).unwrap(),
                    Asset::Native,
                    Amount::from_string("1").unwrap(),
                )
                .unwrap(),
            )
            .build_at(100)
            .unwrap()
            .into_envelope()
            .to_base64()
    }

    #[tokio::test]
    async fn public_key_requires_access() {
        let bridge =
            LocalKeypairBridge::new(LedgerKeypair::from_secret(SECRET).unwrap(), Network::Testnet);
        assert!(!bridge.is_allowed().await.unwrap());
        assert!(matches!(
            bridge.get_public_key().await,
            Err(WalletError::PermissionDenied(_))
        ));

        bridge.request_access().await.unwrap();
        assert_eq!(
            bridge.get_public_key().await.unwrap(),
            "GAMX62ZD4FWIKMWGVPEDR6WNL2TYTPQMO2ZJEAZUAON7VCZ5G2GWDF7W"
        );
    }

    #[tokio::test]
    async fn signs_envelope_for_requested_network() {
        let keypair = LedgerKeypair::from_secret(SECRET).unwrap();
        let address = keypair.address().clone();
        let bridge = LocalKeypairBridge::pre_authorized(keypair, Network::Testnet);

        let signed = bridge
            .sign_transaction(
                &unsigned_envelope(&address),
                &SignOptions::for_network(Network::Testnet),
            )
            .await
            .unwrap();

        let envelope = TransactionEnvelope::from_base64(&signed).unwrap();
        let hash = envelope
            .transaction
            .signature_hash(Network::Testnet.passphrase());
        assert_eq!(envelope.signatures.len(), 1);
        assert!(verify_signature(&address, &hash, &envelope.signatures[0].signature).unwrap());
    }

    #[tokio::test]
    async fn refuses_other_network() {
        let keypair = LedgerKeypair::from_secret(SECRET).unwrap();
        let address = keypair.address().clone();
        let bridge = LocalKeypairBridge::pre_authorized(keypair, Network::Testnet);

        let err = bridge
            .sign_transaction(
                &unsigned_envelope(&address),
                &SignOptions::for_network(Network::Public),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NetworkMismatch { .. }));
    }

    #[tokio::test]
    async fn refuses_foreign_source_account() {
        let bridge = LocalKeypairBridge::pre_authorized(LedgerKeypair::generate(), Network::Testnet);
        let other = Address::from_string(DESTINATION).unwrap();
        let err = bridge
            .sign_transaction(
                &unsigned_envelope(&other),
                &SignOptions::for_network(Network::Testnet),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Bridge(_)));
    }
}
