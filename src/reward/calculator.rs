use super::digest::HashDigest;
use super::table::RewardTable;
use crate::error::EngineError;
use crate::models::Amount;

/// Per-transaction reward and lottery rank from a transaction hash.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    table: RewardTable,
}

impl RewardCalculator {
    pub fn new(table: RewardTable) -> Self {
        Self { table }
    }

    pub fn with_unit(reward_unit: Amount) -> Self {
        Self::new(RewardTable::new(reward_unit))
    }

    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    /// Instant-lottery reward keyed by the hash's trailing digit.
    pub fn reward_for(&self, hash: &str) -> Result<Amount, EngineError> {
        let digest = HashDigest::of(hash)?;
        self.table.reward(digest.trailing_digit).ok_or_else(|| {
            EngineError::invalid_input(format!("digit {} has no reward", digest.trailing_digit))
        })
    }

    /// Window-lottery rank: the hash's digit sum, higher ranks first.
    pub fn lottery_rank(&self, hash: &str) -> Result<u64, EngineError> {
        HashDigest::of(hash).map(|d| d.digit_sum)
    }
}
