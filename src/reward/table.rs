use crate::models::Amount;

/// Reward multipliers (in reward units) indexed by trailing digit.
///
/// Digits 1..=9 double from 1 to 256. Digit 0 is the top prize (512), one
/// step past digit 9, not a zero reward.
pub const REWARD_MULTIPLIERS: [u64; 10] = [512, 1, 2, 4, 8, 16, 32, 64, 128, 256];

/// Fixed digit → reward lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardTable {
    rewards: [Amount; 10],
}

impl RewardTable {
    /// Build the table for a given reward unit (0.1 in production, giving
    /// 0.1, 0.2, ... 25.6 and 51.2 for digit 0).
    pub fn new(reward_unit: Amount) -> Self {
        let mut rewards = [0; 10];
        for (slot, multiplier) in rewards.iter_mut().zip(REWARD_MULTIPLIERS) {
            *slot = reward_unit.saturating_mul(multiplier);
        }
        Self { rewards }
    }

    /// Reward for `digit`; `None` for anything outside 0..=9.
    #[inline]
    pub fn reward(&self, digit: u8) -> Option<Amount> {
        self.rewards.get(usize::from(digit)).copied()
    }

    /// Largest prize in the table (digit 0).
    pub fn top_prize(&self) -> Amount {
        self.rewards[0]
    }
}
