use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bridge::WalletExtensionBridge;
use crate::errors::{WalletError, WalletResult};

/// Wallet providers the front-end knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletProvider {
    /// Freighter browser extension.
    Freighter,
    /// In-process keypair signer.
    LocalKeypair,
}

impl WalletProvider {
    pub const ALL: [WalletProvider; 2] = [WalletProvider::Freighter, WalletProvider::LocalKeypair];

    pub fn name(&self) -> &'static str {
        match self {
            WalletProvider::Freighter => "freighter",
            WalletProvider::LocalKeypair => "local",
        }
    }
}

impl fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WalletProvider {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WalletProvider::ALL
            .into_iter()
            .find(|provider| provider.name() == wanted)
            .ok_or_else(|| WalletError::ExtensionNotInstalled(s.trim().to_string()))
    }
}

/// Registry mapping each provider variant to the bridge that implements it.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    bridges: HashMap<WalletProvider, Rc<dyn WalletExtensionBridge>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: WalletProvider,
        bridge: Rc<dyn WalletExtensionBridge>,
    ) -> &mut Self {
        if self.bridges.insert(provider, bridge).is_some() {
            log::warn!("Replacing bridge registered for provider {}", provider);
        }
        self
    }

    pub fn with(mut self, provider: WalletProvider, bridge: Rc<dyn WalletExtensionBridge>) -> Self {
        self.register(provider, bridge);
        self
    }

    pub fn get(&self, provider: WalletProvider) -> WalletResult<Rc<dyn WalletExtensionBridge>> {
        self.bridges
            .get(&provider)
            .cloned()
            .ok_or_else(|| WalletError::ExtensionNotInstalled(provider.name().to_string()))
    }

    /// Resolve a provider by the name the UI passes in.
    pub fn resolve(
        &self,
        name: &str,
    ) -> WalletResult<(WalletProvider, Rc<dyn WalletExtensionBridge>)> {
        let provider = name.parse::<WalletProvider>()?;
        Ok((provider, self.get(provider)?))
    }

    pub fn providers(&self) -> Vec<WalletProvider> {
        let mut providers: Vec<_> = self.bridges.keys().copied().collect();
        providers.sort_by_key(|provider| provider.name());
        providers
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Network;
    use crate::bridge::LocalKeypairBridge;
    use crate::crypto::LedgerKeypair;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(
            "Freighter".parse::<WalletProvider>().unwrap(),
            WalletProvider::Freighter
        );
        assert_eq!(
            " local ".parse::<WalletProvider>().unwrap(),
            WalletProvider::LocalKeypair
        );
        assert!(matches!(
            "metamask".parse::<WalletProvider>(),
            Err(WalletError::ExtensionNotInstalled(name)) if name == "metamask"
        ));
    }

    #[test]
    fn unregistered_provider_is_not_installed() {
        let registry = ProviderRegistry::new().with(
            WalletProvider::LocalKeypair,
            Rc::new(LocalKeypairBridge::new(
                LedgerKeypair::generate(),
                Network::Testnet,
            )),
        );

        assert!(registry.resolve("local").is_ok());
        assert!(matches!(
            registry.resolve("freighter"),
            Err(WalletError::ExtensionNotInstalled(name)) if name == "freighter"
        ));
        assert_eq!(registry.providers(), vec![WalletProvider::LocalKeypair]);
    }
}
