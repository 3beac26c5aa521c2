use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::Timestamp;
use crate::error::EngineError;
use crate::models::Amount;

/// A liquidity deposit awaiting return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub address: String,
    pub amount: Amount,
    pub deposited_at: Timestamp,
    pub release_at: Timestamp,
}

impl StakeRecord {
    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.release_at <= now
    }
}

/// Point-in-time copy of ledger records.
///
/// Owns its records, so it can be iterated any number of times and later
/// ledger writes never show up in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PendingReleases {
    records: Vec<StakeRecord>,
}

impl PendingReleases {
    pub fn iter(&self) -> std::slice::Iter<'_, StakeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for PendingReleases {
    type Item = StakeRecord;
    type IntoIter = std::vec::IntoIter<StakeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a PendingReleases {
    type Item = &'a StakeRecord;
    type IntoIter = std::slice::Iter<'a, StakeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Liquidity deposits keyed by address, at most one live record each.
#[derive(Debug, Clone)]
pub struct StakeLedger {
    records: HashMap<String, StakeRecord>,
    hold_ms: i64,
}

impl StakeLedger {
    pub fn new(hold_ms: i64) -> Self {
        Self {
            records: HashMap::new(),
            hold_ms,
        }
    }

    /// Record a deposit releasing at `now + hold`.
    ///
    /// Upsert: a second deposit from the same address replaces the pending
    /// record (amount and release time) instead of accumulating. Returns the
    /// replaced record.
    pub fn record_deposit(
        &mut self,
        address: &str,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Option<StakeRecord>, EngineError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(EngineError::invalid_input("stake address is empty"));
        }

        let record = StakeRecord {
            address: address.to_string(),
            amount,
            deposited_at: now,
            release_at: now.saturating_add(self.hold_ms),
        };
        Ok(self.records.insert(address.to_string(), record))
    }

    /// Snapshot of every held record, due or not, in no particular order.
    pub fn pending_releases(&self) -> PendingReleases {
        PendingReleases {
            records: self.records.values().cloned().collect(),
        }
    }

    /// Snapshot of records whose release time has passed.
    pub fn due_releases(&self, now: Timestamp) -> PendingReleases {
        PendingReleases {
            records: self
                .records
                .values()
                .filter(|r| r.is_due(now))
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, address: &str) -> Option<&StakeRecord> {
        self.records.get(address)
    }

    /// Remove a record once its return has been handled.
    pub fn acknowledge(&mut self, address: &str) -> Option<StakeRecord> {
        self.records.remove(address)
    }

    /// Remove `record` only if it is still the live one for its address.
    /// Protects a newer deposit made while the old release was in flight.
    pub fn acknowledge_if_current(&mut self, record: &StakeRecord) -> bool {
        if self.records.get(&record.address) == Some(record) {
            self.records.remove(&record.address);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
