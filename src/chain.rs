//! External Collaborators
//!
//! The engine never talks to the chain itself. Transaction and balance
//! lookups come through [`TransactionSource`]; finished commands go out
//! through [`CommandExecutor`]. Signing, submission and retries live behind
//! those boundaries.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::commands::Command;
use crate::error::EngineError;
use crate::models::{format_units, Amount, RawTransaction, TransactionRecord};

/// Transaction / balance lookup.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn get_transaction(&self, hash: &str) -> Result<TransactionRecord, EngineError>;

    async fn get_balance(&self, address: &str) -> Result<Amount, EngineError>;
}

/// Transfer execution.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<(), EngineError>;
}

/// Lookup against an indexer sidecar.
///
/// - `GET {base}/transactions/{hash}` → transaction JSON
/// - `GET {base}/accounts/{address}/balance` → `{"balance": <nano>}`
pub struct HttpTransactionSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Amount,
}

impl HttpTransactionSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TransactionSource for HttpTransactionSource {
    async fn get_transaction(&self, hash: &str) -> Result<TransactionRecord, EngineError> {
        if hash.is_empty() {
            return Err(EngineError::invalid_input("transaction hash is empty"));
        }
        let url = format!("{}/transactions/{}", self.base_url, hash);
        debug!(%url, "fetching transaction");

        let raw: RawTransaction = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        TransactionRecord::try_from(raw)
    }

    async fn get_balance(&self, address: &str) -> Result<Amount, EngineError> {
        let url = format!("{}/accounts/{}/balance", self.base_url, address);
        debug!(%url, "fetching balance");

        let body: BalanceResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.balance)
    }
}

/// Logs commands instead of executing them.
#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor;

#[async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn execute(&self, command: &Command) -> Result<(), EngineError> {
        info!(
            kind = command.kind.as_str(),
            to = %command.to,
            amount = %format_units(command.amount),
            "🧪 dry-run: command not submitted"
        );
        Ok(())
    }
}

/// Hands commands to the transfer-execution service (`POST {base}/commands`).
pub struct HttpCommandExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCommandExecutor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/commands", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl CommandExecutor for HttpCommandExecutor {
    async fn execute(&self, command: &Command) -> Result<(), EngineError> {
        self.client
            .post(&self.endpoint)
            .json(command)
            .send()
            .await?
            .error_for_status()?;
        info!(command = %command, "command handed to executor");
        Ok(())
    }
}
