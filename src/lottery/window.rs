use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::Timestamp;
use crate::config::BPS_DENOMINATOR;
use crate::error::EngineError;
use crate::models::Amount;

/// One participant's entry in the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryEntry {
    pub participant: String,
    pub rank: u64,
    pub arrived_at: Timestamp,
}

/// Outcome of settling a window.
///
/// `distributable = total_prize - retained_fee`, and
/// `per_winner_amount * winners.len() + undistributed_remainder == distributable`.
/// The remainder is neither refunded nor carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub settled_at: Timestamp,
    /// Every participant tied at the winning rank, sorted by address
    pub winners: Vec<String>,
    pub winning_rank: u64,
    /// Entries still inside the window
    pub entry_count: usize,
    /// Entries discarded as expired
    pub expired_count: usize,
    pub total_prize: Amount,
    pub distributable: Amount,
    pub retained_fee: Amount,
    pub per_winner_amount: Amount,
    pub undistributed_remainder: Amount,
}

/// In-memory lottery window: one live entry per participant.
#[derive(Debug, Clone)]
pub struct LotteryWindow {
    entries: HashMap<String, LotteryEntry>,
    window_ms: i64,
    entry_stake: Amount,
    fee_retention_bps: u32,
}

impl LotteryWindow {
    pub fn new(window_ms: i64, entry_stake: Amount, fee_retention_bps: u32) -> Self {
        Self {
            entries: HashMap::new(),
            window_ms,
            entry_stake,
            fee_retention_bps,
        }
    }

    /// Upsert the participant's entry.
    ///
    /// A participant holds at most one entry per window; re-entering replaces
    /// the previous rank and arrival time. Returns the replaced entry.
    pub fn record(
        &mut self,
        participant: &str,
        rank: u64,
        now: Timestamp,
    ) -> Result<Option<LotteryEntry>, EngineError> {
        let participant = participant.trim();
        if participant.is_empty() {
            return Err(EngineError::invalid_input("lottery participant is empty"));
        }

        let entry = LotteryEntry {
            participant: participant.to_string(),
            rank,
            arrived_at: now,
        };
        Ok(self.entries.insert(participant.to_string(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, participant: &str) -> Option<&LotteryEntry> {
        self.entries.get(participant)
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    #[inline]
    fn is_live(&self, entry: &LotteryEntry, now: Timestamp) -> bool {
        now.saturating_sub(entry.arrived_at) <= self.window_ms
    }

    /// Settle the window at `now`.
    ///
    /// Returns `None` (and leaves the window untouched) when no entry is still
    /// live. Otherwise every entry tied at the highest rank wins an equal
    /// floor share of the pot after fee retention, and the whole window is
    /// cleared, expired entries included.
    pub fn settle(&mut self, now: Timestamp) -> Option<Settlement> {
        let live: Vec<&LotteryEntry> = self
            .entries
            .values()
            .filter(|entry| self.is_live(entry, now))
            .collect();

        let winning_rank = live.iter().map(|entry| entry.rank).max()?;

        let mut winners: Vec<String> = live
            .iter()
            .filter(|entry| entry.rank == winning_rank)
            .map(|entry| entry.participant.clone())
            .collect();
        winners.sort();

        let entry_count = live.len();
        let expired_count = self.entries.len() - entry_count;

        let total_prize = self.entry_stake.saturating_mul(entry_count as u64);
        let distributable = (u128::from(total_prize)
            * u128::from(BPS_DENOMINATOR.saturating_sub(u64::from(self.fee_retention_bps)))
            / u128::from(BPS_DENOMINATOR)) as Amount;
        let retained_fee = total_prize - distributable;
        let per_winner_amount = distributable / winners.len() as u64;
        let undistributed_remainder = distributable - per_winner_amount * winners.len() as u64;

        self.entries.clear();

        Some(Settlement {
            settled_at: now,
            winners,
            winning_rank,
            entry_count,
            expired_count,
            total_prize,
            distributable,
            retained_fee,
            per_winner_amount,
            undistributed_remainder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: i64 = 24 * 60 * 1000;

    fn window(stake: Amount) -> LotteryWindow {
        LotteryWindow::new(WINDOW_MS, stake, 1_000)
    }

    #[test]
    fn test_single_winner_takes_ninety_percent() {
        let mut w = window(10);
        w.record("EQa", 50, 0).unwrap();
        w.record("EQb", 150, 0).unwrap();
        w.record("EQc", 100, 0).unwrap();

        let s = w.settle(1_000).unwrap();
        assert_eq!(s.total_prize, 30);
        assert_eq!(s.distributable, 27);
        assert_eq!(s.retained_fee, 3);
        assert_eq!(s.winners, vec!["EQb".to_string()]);
        assert_eq!(s.winning_rank, 150);
        assert_eq!(s.per_winner_amount, 27);
        assert_eq!(s.undistributed_remainder, 0);
        assert!(w.is_empty());
    }

    #[test]
    fn test_tied_winners_floor_split() {
        let mut w = window(10);
        w.record("EQb", 120, 0).unwrap();
        w.record("EQa", 120, 0).unwrap();
        w.record("EQc", 7, 0).unwrap();
        w.record("EQd", 3, 0).unwrap();
        w.record("EQe", 1, 0).unwrap();

        // pot 50, distributable 45, two winners -> 22 each, 1 dropped
        let s = w.settle(0).unwrap();
        assert_eq!(s.winners, vec!["EQa".to_string(), "EQb".to_string()]);
        assert_eq!(s.distributable, 45);
        assert_eq!(s.per_winner_amount, 22);
        assert_eq!(s.undistributed_remainder, 1);
    }

    #[test]
    fn test_single_entry_still_pays_fee() {
        let mut w = window(10_000_000_000);
        w.record("EQsolo", 0, 0).unwrap();
        let s = w.settle(0).unwrap();
        assert_eq!(s.per_winner_amount, 9_000_000_000);
        assert_eq!(s.retained_fee, 1_000_000_000);
    }

    #[test]
    fn test_settle_empty_twice_is_noop() {
        let mut w = window(10);
        assert!(w.settle(0).is_none());
        assert!(w.settle(0).is_none());
    }

    #[test]
    fn test_settled_window_starts_fresh() {
        let mut w = window(10);
        w.record("EQa", 1, 0).unwrap();
        assert!(w.settle(10).is_some());
        assert!(w.settle(20).is_none());

        w.record("EQb", 2, 30).unwrap();
        let s = w.settle(40).unwrap();
        assert_eq!(s.winners, vec!["EQb".to_string()]);
        assert_eq!(s.entry_count, 1);
    }

    #[test]
    fn test_reentry_overwrites() {
        let mut w = window(10);
        assert!(w.record("EQa", 200, 0).unwrap().is_none());
        let previous = w.record("EQa", 5, 100).unwrap().unwrap();
        assert_eq!(previous.rank, 200);
        assert_eq!(w.len(), 1);
        assert_eq!(w.entry("EQa").unwrap().rank, 5);

        w.record("EQb", 6, 100).unwrap();
        let s = w.settle(200).unwrap();
        assert_eq!(s.winners, vec!["EQb".to_string()]);
        assert_eq!(s.total_prize, 20);
    }

    #[test]
    fn test_expired_entries_excluded_but_cleared() {
        let mut w = window(10);
        w.record("EQold", 999, 0).unwrap();
        w.record("EQnew", 1, WINDOW_MS).unwrap();

        // EQold is exactly one millisecond past the window
        let s = w.settle(WINDOW_MS + 1).unwrap();
        assert_eq!(s.winners, vec!["EQnew".to_string()]);
        assert_eq!(s.entry_count, 1);
        assert_eq!(s.expired_count, 1);
        assert_eq!(s.total_prize, 10);
        assert!(w.is_empty());
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let mut w = window(10);
        w.record("EQa", 1, 0).unwrap();
        assert!(w.settle(WINDOW_MS).is_some());
    }

    #[test]
    fn test_only_expired_entries_returns_none_without_clearing() {
        let mut w = window(10);
        w.record("EQold", 1, 0).unwrap();
        assert!(w.settle(WINDOW_MS + 1).is_none());
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_empty_participant_rejected() {
        let mut w = window(10);
        assert!(w.record("  ", 1, 0).unwrap_err().is_invalid_input());
        assert!(w.is_empty());
    }

    #[test]
    fn test_fee_above_full_pot_retains_everything() {
        let mut w = LotteryWindow::new(WINDOW_MS, 10, 20_000);
        w.record("EQa", 1, 0).unwrap();
        let s = w.settle(0).unwrap();
        assert_eq!(s.distributable, 0);
        assert_eq!(s.retained_fee, 10);
        assert_eq!(s.per_winner_amount, 0);
    }
}
