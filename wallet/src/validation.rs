use crate::blockchain::{Address, Amount};
use crate::errors::{WalletError, WalletResult};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Input validation utilities for the wallet
pub struct InputValidator {
    // Compiled regex patterns for performance
    address_pattern: Regex,
    amount_pattern: Regex,
    asset_code_pattern: Regex,

    // Blacklisted patterns for security
    malicious_patterns: Vec<Regex>,
}

static SHARED: OnceCell<InputValidator> = OnceCell::new();

impl InputValidator {
    /// Longest free-text field the UI accepts.
    pub const MAX_TEXT_LEN: usize = 200;

    pub fn new() -> WalletResult<Self> {
        let address_pattern = compile(r"^G[A-Z2-7]{55}$")?;
        let amount_pattern = compile(r"^\d{1,12}(\.\d{1,7})?$")?;
        let asset_code_pattern = compile(r"^[A-Za-z0-9]{1,12}$")?;

        // Common malicious patterns to block
        let malicious_patterns = [
            r"<script",
            r"javascript:",
            r"data:text/html",
            r"vbscript:",
            r"onload=",
            r"onerror=",
        ]
        .into_iter()
        .map(compile)
        .collect::<WalletResult<Vec<_>>>()?;

        Ok(InputValidator {
            address_pattern,
            amount_pattern,
            asset_code_pattern,
            malicious_patterns,
        })
    }

    /// Process-wide validator, compiled on first use.
    pub fn shared() -> WalletResult<&'static InputValidator> {
        SHARED.get_or_try_init(InputValidator::new)
    }

    /// Validate and parse a ledger account address
    pub fn validate_address(&self, address: &str) -> WalletResult<Address> {
        let address = address.trim();
        self.check_basic_security(address)
            .map_err(|_| WalletError::InvalidAddress("Address contains unsafe content".to_string()))?;

        if address.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(
                "Address format is invalid".to_string(),
            ));
        }

        // Pattern only covers the alphabet; the checksum is verified here.
        Address::from_string(address)
    }

    /// Validate and parse a positive amount with at most seven decimals
    pub fn validate_amount(&self, amount: &str) -> WalletResult<Amount> {
        let amount = amount.trim();
        self.check_basic_security(amount)
            .map_err(|_| WalletError::InvalidAmount("Amount contains unsafe content".to_string()))?;

        if amount.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        if !self.amount_pattern.is_match(amount) {
            return Err(WalletError::InvalidAmount(
                "Amount format is invalid".to_string(),
            ));
        }

        let parsed = Amount::from_string(amount)?;
        if parsed.is_zero() {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        Ok(parsed)
    }

    /// Validate an issued asset code
    pub fn validate_asset_code(&self, code: &str) -> WalletResult<String> {
        let code = code.trim();
        if !self.asset_code_pattern.is_match(code) {
            return Err(WalletError::InvalidAsset(format!(
                "Asset code must be 1 to 12 letters or digits, got {:?}",
                code
            )));
        }
        Ok(code.to_string())
    }

    /// Validate a required free-text form field, naming it on failure
    pub fn validate_text_field(&self, field: &str, value: &str) -> WalletResult<String> {
        let value = value.trim();
        if value.is_empty() || value.chars().count() > Self::MAX_TEXT_LEN {
            return Err(WalletError::validation_failed(field));
        }
        self.check_basic_security(value)
            .map_err(|_| WalletError::validation_failed(field))?;
        Ok(value.to_string())
    }

    /// Check for basic security issues in any input
    fn check_basic_security(&self, input: &str) -> WalletResult<()> {
        if input.len() > 1000 {
            return Err(WalletError::validation_failed("input"));
        }

        let lowered = input.to_lowercase();
        if self
            .malicious_patterns
            .iter()
            .any(|pattern| pattern.is_match(&lowered))
        {
            return Err(WalletError::validation_failed("input"));
        }

        Ok(())
    }
}

fn compile(pattern: &str) -> WalletResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| WalletError::ConfigError(format!("Invalid validation pattern: {}", e)))
}
