/// Ledger client for communicating with Horizon
///
/// This module provides HTTP communication with a Horizon server, implementing
/// the two calls the wallet needs: loading account state and submitting
/// signed transaction envelopes.
use crate::blockchain::{Account, Address, Asset, Balance, Network};
use crate::errors::{WalletError, WalletResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Outcome of a transaction submission as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub hash: String,
    pub ledger: u32,
    pub successful: bool,
    #[serde(default)]
    pub envelope_xdr: Option<String>,
    #[serde(default)]
    pub result_xdr: Option<String>,
}

/// Network client able to read accounts and submit signed envelopes.
#[async_trait(?Send)]
pub trait LedgerClient {
    async fn load_account(&self, address: &Address) -> WalletResult<Account>;

    async fn submit_transaction(&self, signed_envelope_xdr: &str)
        -> WalletResult<SubmissionResult>;
}

/// HTTP client for the Horizon REST API
pub struct HorizonClient {
    client: Client,
    base_url: String,
}

/// Account record as Horizon serves it
#[derive(Debug, Deserialize)]
struct HorizonAccount {
    account_id: String,
    sequence: String,
    balances: Vec<HorizonBalance>,
}

#[derive(Debug, Deserialize)]
struct HorizonBalance {
    balance: String,
    asset_type: String,
    #[serde(default)]
    asset_code: Option<String>,
    #[serde(default)]
    asset_issuer: Option<String>,
}

/// Submission response structure
#[derive(Debug, Deserialize)]
struct HorizonSubmission {
    hash: String,
    ledger: u32,
    #[serde(default = "default_successful")]
    successful: bool,
    #[serde(default)]
    envelope_xdr: Option<String>,
    #[serde(default)]
    result_xdr: Option<String>,
}

fn default_successful() -> bool {
    true
}

/// Problem document returned on failed requests
#[derive(Debug, Deserialize)]
struct HorizonProblem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    extras: Option<HorizonProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct HorizonProblemExtras {
    #[serde(default)]
    result_codes: Option<HorizonResultCodes>,
}

#[derive(Debug, Deserialize)]
struct HorizonResultCodes {
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    operations: Vec<String>,
}

impl HorizonClient {
    /// Create a new Horizon client
    pub fn new(base_url: impl Into<String>) -> WalletResult<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(WalletError::ConfigError(
                "Horizon URL cannot be empty".to_string(),
            ));
        }

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(std::time::Duration::from_secs(30));
        let client = builder.build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(HorizonClient {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Client for the network's public Horizon instance
    pub fn for_network(network: Network) -> WalletResult<Self> {
        Self::new(network.default_horizon_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from_response(response: reqwest::Response) -> WalletError {
        let status = response.status();
        match response.json::<HorizonProblem>().await {
            Ok(problem) => WalletError::NetworkError(describe_problem(status.as_u16(), &problem)),
            Err(_) => WalletError::NetworkError(format!("HTTP error: {}", status)),
        }
    }
}

#[async_trait(?Send)]
impl LedgerClient for HorizonClient {
    async fn load_account(&self, address: &Address) -> WalletResult<Account> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        log::debug!("Loading account {}", address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::NetworkError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let record: HorizonAccount = response
            .json()
            .await
            .map_err(|e| WalletError::InvalidResponse(format!("Failed to parse account: {}", e)))?;

        account_from_record(record)
    }

    async fn submit_transaction(
        &self,
        signed_envelope_xdr: &str,
    ) -> WalletResult<SubmissionResult> {
        let url = format!("{}/transactions", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("tx", signed_envelope_xdr)])
            .send()
            .await
            .map_err(|e| WalletError::NetworkError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let submission: HorizonSubmission = response.json().await.map_err(|e| {
            WalletError::InvalidResponse(format!("Failed to parse submission: {}", e))
        })?;

        log::info!(
            "Transaction {} included in ledger {}",
            submission.hash,
            submission.ledger
        );

        Ok(SubmissionResult {
            hash: submission.hash,
            ledger: submission.ledger,
            successful: submission.successful,
            envelope_xdr: submission.envelope_xdr,
            result_xdr: submission.result_xdr,
        })
    }
}

fn account_from_record(record: HorizonAccount) -> WalletResult<Account> {
    let address = Address::from_string(&record.account_id)?;
    let sequence = record.sequence.parse::<i64>().map_err(|_| {
        WalletError::InvalidResponse(format!("Invalid sequence number: {}", record.sequence))
    })?;

    let mut balances = Vec::with_capacity(record.balances.len());
    for line in record.balances {
        let asset = match line.asset_type.as_str() {
            "native" => Asset::Native,
            "credit_alphanum4" | "credit_alphanum12" => {
                let code = line.asset_code.as_deref().ok_or_else(|| {
                    WalletError::InvalidResponse("Balance line missing asset code".to_string())
                })?;
                let issuer = line.asset_issuer.as_deref().ok_or_else(|| {
                    WalletError::InvalidResponse("Balance line missing asset issuer".to_string())
                })?;
                Asset::credit(code, Address::from_string(issuer)?)?
            }
            // Liquidity pool shares carry no spendable balance for this wallet.
            _ => continue,
        };
        balances.push(Balance {
            asset,
            balance: line.balance,
        });
    }

    Ok(Account {
        address,
        sequence,
        balances,
    })
}

fn describe_problem(status: u16, problem: &HorizonProblem) -> String {
    let mut message = format!("HTTP {} {}", status, problem.title);
    if let Some(codes) = problem
        .extras
        .as_ref()
        .and_then(|extras| extras.result_codes.as_ref())
    {
        if let Some(tx_code) = &codes.transaction {
            message.push_str(&format!(" [{}", tx_code));
            if !codes.operations.is_empty() {
                message.push_str(&format!(": {}", codes.operations.join(", ")));
            }
            message.push(']');
        }
    } else if let Some(detail) = &problem.detail {
        message.push_str(&format!(": {}", detail));
    }
    message
}
