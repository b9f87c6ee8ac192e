/// Core ledger types for the food-bank wallet
///
/// Addresses, fixed-point amounts, assets and account snapshots as the
/// Stellar network exposes them.
use crate::errors::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger networks the wallet can operate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    #[default]
    Testnet,
    Public,
}

impl Network {
    pub const TESTNET_PASSPHRASE: &'static str = "Test SDF Network ; September 2015";
    pub const PUBLIC_PASSPHRASE: &'static str = "Public Global Stellar Network ; September 2015";

    /// Passphrase that scopes transaction signatures to this network.
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Testnet => Self::TESTNET_PASSPHRASE,
            Network::Public => Self::PUBLIC_PASSPHRASE,
        }
    }

    /// Name the wallet extension reports for this network.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Testnet => "TESTNET",
            Network::Public => "PUBLIC",
        }
    }

    pub fn default_horizon_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://horizon-testnet.stellar.org",
            Network::Public => "https://horizon.stellar.org",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TESTNET" => Ok(Network::Testnet),
            "PUBLIC" | "MAINNET" => Ok(Network::Public),
            other => Err(WalletError::NetworkMismatch {
                expected: Network::Testnet.name().to_string(),
                actual: other.to_string(),
            }),
        }
    }
}

/// A ledger account address
///
/// Addresses are ed25519 public keys in StrKey form (`G...`, 56 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    key: [u8; 32],
    encoded: String,
}

impl Address {
    /// Length of an encoded account address.
    pub const ENCODED_LEN: usize = 56;

    /// Create an address from raw ed25519 public key bytes
    pub fn from_public_key(key: [u8; 32]) -> Self {
        let encoded = stellar_strkey::ed25519::PublicKey(key).to_string();
        Address { key, encoded }
    }

    /// Parse a StrKey account address
    pub fn from_string(address: &str) -> WalletResult<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        if !address.starts_with('G') {
            return Err(WalletError::InvalidAddress(
                "Account address must start with 'G'".to_string(),
            ));
        }

        if address.len() != Self::ENCODED_LEN {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid address length: expected {} characters, got {}",
                Self::ENCODED_LEN,
                address.len()
            )));
        }

        let decoded = stellar_strkey::ed25519::PublicKey::from_string(address)
            .map_err(|e| WalletError::InvalidAddress(format!("Invalid StrKey: {:?}", e)))?;

        Ok(Self::from_public_key(decoded.0))
    }

    /// Raw ed25519 public key bytes
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Last four key bytes, used as the signature hint on envelopes.
    pub fn signature_hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.key[28..]);
        hint
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_string(&raw).map_err(serde::de::Error::custom)
    }
}

/// Represents an amount of a ledger asset
///
/// Uses fixed-point arithmetic in stroops (1 unit = 10_000_000 stroops),
/// matching the ledger's signed 64-bit representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    stroops: i64,
}

impl Amount {
    /// Number of decimal places carried by ledger amounts
    pub const DECIMALS: u8 = 7;
    /// Stroops per whole unit (10^7)
    pub const STROOPS_PER_UNIT: i64 = 10_000_000;
    /// Largest representable amount, also the default trustline limit
    pub const MAX: Amount = Amount { stroops: i64::MAX };

    /// Create amount from stroops
    pub fn from_stroops(stroops: i64) -> WalletResult<Self> {
        if stroops < 0 {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be negative".to_string(),
            ));
        }
        Ok(Amount { stroops })
    }

    /// Create amount from a decimal string such as `"12.5"`
    pub fn from_string(amount_str: &str) -> WalletResult<Self> {
        let amount_str = amount_str.trim();
        if amount_str.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let (whole_str, fractional_str) = match amount_str.split_once('.') {
            Some((whole, fractional)) => (whole, fractional),
            None => (amount_str, ""),
        };

        if whole_str.is_empty()
            || !whole_str.bytes().all(|b| b.is_ascii_digit())
            || !fractional_str.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }

        if fractional_str.len() > Self::DECIMALS as usize {
            return Err(WalletError::InvalidAmount(
                "Too many decimal places".to_string(),
            ));
        }

        let whole: i64 = whole_str
            .parse()
            .map_err(|_| WalletError::InvalidAmount("Amount overflow".to_string()))?;

        let fractional: i64 = if fractional_str.is_empty() {
            0
        } else {
            format!("{:0<7}", fractional_str)
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Invalid fractional part".to_string()))?
        };

        let stroops = whole
            .checked_mul(Self::STROOPS_PER_UNIT)
            .and_then(|w| w.checked_add(fractional))
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))?;

        Self::from_stroops(stroops)
    }

    pub fn stroops(&self) -> i64 {
        self.stroops
    }

    pub fn is_zero(&self) -> bool {
        self.stroops == 0
    }

    /// Amount with the full seven decimal places, as the ledger prints it
    pub fn as_string(&self) -> String {
        let whole = self.stroops / Self::STROOPS_PER_UNIT;
        let fractional = self.stroops % Self::STROOPS_PER_UNIT;
        format!("{}.{:07}", whole, fractional)
    }

    pub fn checked_add(&self, other: &Amount) -> WalletResult<Amount> {
        self.stroops
            .checked_add(other.stroops)
            .map(|stroops| Amount { stroops })
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in addition".to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_string(s)
    }
}

/// Asset held on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Asset {
    /// The ledger's base currency; held without a trustline
    Native,
    /// Issued asset with a one to four character code
    CreditAlphanum4 { code: String, issuer: Address },
    /// Issued asset with a five to twelve character code
    CreditAlphanum12 { code: String, issuer: Address },
}

impl Asset {
    pub const MAX_CODE_LEN: usize = 12;

    /// Build an issued asset, choosing the code width from the code length
    pub fn credit(code: &str, issuer: Address) -> WalletResult<Self> {
        let code = code.trim();
        if code.is_empty() || code.len() > Self::MAX_CODE_LEN {
            return Err(WalletError::InvalidAsset(format!(
                "Asset code must be 1 to {} characters",
                Self::MAX_CODE_LEN
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(WalletError::InvalidAsset(
                "Asset code must be alphanumeric".to_string(),
            ));
        }

        if code.len() <= 4 {
            Ok(Asset::CreditAlphanum4 {
                code: code.to_string(),
                issuer,
            })
        } else {
            Ok(Asset::CreditAlphanum12 {
                code: code.to_string(),
                issuer,
            })
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Asset::Native => None,
            Asset::CreditAlphanum4 { code, .. } | Asset::CreditAlphanum12 { code, .. } => {
                Some(code)
            }
        }
    }

    pub fn issuer(&self) -> Option<&Address> {
        match self {
            Asset::Native => None,
            Asset::CreditAlphanum4 { issuer, .. } | Asset::CreditAlphanum12 { issuer, .. } => {
                Some(issuer)
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
                write!(f, "{}:{}", code, issuer)
            }
        }
    }
}

/// One balance line of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: Asset,
    /// Decimal string exactly as reported by the ledger
    pub balance: String,
}

/// Read-only account snapshot loaded from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub sequence: i64,
    pub balances: Vec<Balance>,
}

impl Account {
    /// Native balance line, if the account reports one
    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|line| line.asset.is_native())
            .map(|line| line.balance.as_str())
    }

    /// Issued assets this account has opted in to
    pub fn trustlines(&self) -> impl Iterator<Item = &Asset> {
        self.balances
            .iter()
            .map(|line| &line.asset)
            .filter(|asset| !asset.is_native())
    }

    pub fn trusts(&self, code: &str, issuer: &Address) -> bool {
        self.trustlines()
            .any(|asset| asset.code() == Some(code) && asset.issuer() == Some(issuer))
    }

    pub fn next_sequence(&self) -> WalletResult<i64> {
        self.sequence.checked_add(1).ok_or_else(|| {
            WalletError::InvalidResponse("Account sequence number exhausted".to_string())
        })
    }
}
