use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::blockchain::Address;
use crate::errors::{WalletError, WalletResult};

/// Ed25519 signing key for a ledger account.
#[derive(Clone)]
pub struct LedgerKeypair {
    signing_key: SigningKey,
    address: Address,
}

impl LedgerKeypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut seed[..]);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let address = Address::from_public_key(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Parse a StrKey secret seed (`S...`).
    pub fn from_secret(secret: &str) -> WalletResult<Self> {
        let decoded = stellar_strkey::ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|e| WalletError::CryptoError(format!("Invalid secret seed: {:?}", e)))?;
        let seed = Zeroizing::new(decoded.0);
        Ok(Self::from_seed(&seed))
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// StrKey secret seed; handle with care.
    pub fn secret(&self) -> Zeroizing<String> {
        Zeroizing::new(stellar_strkey::ed25519::PrivateKey(self.signing_key.to_bytes()).to_string())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerKeypair")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Check an ed25519 signature made by `address` over `message`.
pub fn verify_signature(address: &Address, message: &[u8], signature: &[u8]) -> WalletResult<bool> {
    let verifying_key = VerifyingKey::from_bytes(address.public_key_bytes())
        .map_err(|e| WalletError::CryptoError(format!("Failed to create verifying key: {}", e)))?;

    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| WalletError::CryptoError("Invalid signature format".to_string()))?;

    Ok(verifying_key
        .verify(message, &Signature::from_bytes(&signature))
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "SADQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQP54X";
    const ADDRESS: &str = "GDVEU3DD4KOFECV66VIHWEZOYX4ZKR3WV27L464SIIPOU2IUI3JCZA57";

    #[test]
    fn secret_seed_derives_known_address() {
        let keypair = LedgerKeypair::from_secret(SECRET).unwrap();
        assert_eq!(keypair.address().as_str(), ADDRESS);
        assert_eq!(keypair.secret().as_str(), SECRET);
        assert_eq!(keypair.address().signature_hint(), [0x14, 0x46, 0xd2, 0x2c]);
    }

    #[test]
    fn signatures_verify_against_address() {
        let keypair = LedgerKeypair::generate();
        let signature = keypair.sign(b"distribution plan");
        assert!(verify_signature(keypair.address(), b"distribution plan", &signature).unwrap());
        assert!(!verify_signature(keypair.address(), b"tampered plan", &signature).unwrap());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let keypair = LedgerKeypair::from_secret(SECRET).unwrap();
        let rendered = format!("{:?}", keypair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(SECRET));
    }

    #[test]
    fn malformed_secret_rejected() {
        assert!(matches!(
            LedgerKeypair::from_secret(ADDRESS),
            Err(WalletError::CryptoError(_))
        ));
    }
}
