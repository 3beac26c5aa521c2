use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::EngineError;

/// Token amount in nano-units (1 unit = 1_000_000_000 nano).
pub type Amount = u64;

pub const NANO_PER_UNIT: Amount = 1_000_000_000;

/// Render a nano amount as decimal units, trimming trailing zeros ("51.2").
pub fn format_units(amount: Amount) -> String {
    let whole = amount / NANO_PER_UNIT;
    let frac = amount % NANO_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:09}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// What was transferred in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Asset {
    /// Native coin transfer
    Native,
    /// Jetton transfer, identified by its master contract
    Jetton { master: String },
}

/// Transaction as delivered by the chain lookup, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub sender: Option<String>,
    #[serde(default)]
    pub value: Amount,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub jetton_master: Option<String>,
}

/// Validated transaction record. Immutable, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransaction", into = "RawTransaction")]
pub struct TransactionRecord {
    pub hash: String,
    pub sender: String,
    pub value: Amount,
    pub timestamp: Timestamp,
    pub asset: Asset,
}

impl TransactionRecord {
    pub fn native(hash: &str, sender: &str, value: Amount, timestamp: Timestamp) -> Self {
        Self {
            hash: hash.to_string(),
            sender: sender.to_string(),
            value,
            timestamp,
            asset: Asset::Native,
        }
    }

    pub fn jetton(
        hash: &str,
        sender: &str,
        master: &str,
        value: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            hash: hash.to_string(),
            sender: sender.to_string(),
            value,
            timestamp,
            asset: Asset::Jetton {
                master: master.to_string(),
            },
        }
    }
}

impl TryFrom<RawTransaction> for TransactionRecord {
    type Error = EngineError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let hash = raw
            .hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EngineError::invalid_input("transaction hash is missing"))?;
        let sender = raw
            .sender
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::invalid_input("transaction sender is missing"))?;
        let timestamp = raw
            .timestamp
            .filter(|ts| *ts > 0)
            .ok_or_else(|| EngineError::invalid_input("transaction timestamp is missing"))?;
        let asset = match raw.jetton_master {
            Some(master) if !master.is_empty() => Asset::Jetton { master },
            _ => Asset::Native,
        };

        Ok(Self {
            hash,
            sender,
            value: raw.value,
            timestamp,
            asset,
        })
    }
}

impl From<TransactionRecord> for RawTransaction {
    fn from(tx: TransactionRecord) -> Self {
        let jetton_master = match tx.asset {
            Asset::Jetton { master } => Some(master),
            Asset::Native => None,
        };
        Self {
            hash: Some(tx.hash),
            sender: Some(tx.sender),
            value: tx.value,
            timestamp: Some(tx.timestamp),
            jetton_master,
        }
    }
}
