//! Transfer Commands
//!
//! Pure data describing a transfer for the execution collaborator. The
//! factory only shapes values computed elsewhere; it never executes anything
//! and never touches the ledger or the lottery window.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::clock::Timestamp;
use crate::lottery::Settlement;
use crate::models::{format_units, Amount};
use crate::stake::StakeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Reward-token payout
    TokenTransfer,
    /// Return of staked liquidity tokens
    LiquidityReturn,
    /// Auto-buy purchase sent to the DEX router
    Purchase,
}

impl CommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::TokenTransfer => "TOKEN_TRANSFER",
            CommandKind::LiquidityReturn => "LIQUIDITY_RETURN",
            CommandKind::Purchase => "PURCHASE",
        }
    }
}

/// When a command should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Immediate,
    At(Timestamp),
}

impl Timing {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Timing::Immediate)
    }
}

// Wire form: the string "immediate" or a millisecond timestamp
impl Serialize for Timing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timing::Immediate => serializer.serialize_str("immediate"),
            Timing::At(at) => serializer.serialize_i64(*at),
        }
    }
}

impl<'de> Deserialize<'de> for Timing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Label(String),
            At(Timestamp),
        }

        match Wire::deserialize(deserializer)? {
            Wire::At(at) => Ok(Timing::At(at)),
            Wire::Label(label) if label == "immediate" => Ok(Timing::Immediate),
            Wire::Label(label) => Err(serde::de::Error::custom(format!(
                "unknown timing '{}'",
                label
            ))),
        }
    }
}

/// Uniform `{type, to, amount, timing}` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub to: String,
    pub amount: Amount,
    pub timing: Timing,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.kind.as_str(),
            format_units(self.amount),
            self.to
        )
    }
}

/// Assembles commands from already-computed values.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    liquidity_hold_ms: i64,
}

impl CommandFactory {
    pub fn new(liquidity_hold_ms: i64) -> Self {
        Self { liquidity_hold_ms }
    }

    pub fn token_transfer(&self, to: &str, amount: Amount) -> Command {
        Command {
            kind: CommandKind::TokenTransfer,
            to: to.to_string(),
            amount,
            timing: Timing::Immediate,
        }
    }

    /// Liquidity return due `hold` after the deposit.
    pub fn liquidity_return(&self, to: &str, amount: Amount, deposited_at: Timestamp) -> Command {
        Command {
            kind: CommandKind::LiquidityReturn,
            to: to.to_string(),
            amount,
            timing: Timing::At(deposited_at.saturating_add(self.liquidity_hold_ms)),
        }
    }

    /// Liquidity return for a ledger record, timed at its release.
    pub fn stake_release(&self, record: &StakeRecord) -> Command {
        Command {
            kind: CommandKind::LiquidityReturn,
            to: record.address.clone(),
            amount: record.amount,
            timing: Timing::At(record.release_at),
        }
    }

    pub fn purchase(&self, target: &str, amount: Amount) -> Command {
        Command {
            kind: CommandKind::Purchase,
            to: target.to_string(),
            amount,
            timing: Timing::Immediate,
        }
    }

    /// One immediate payout per winner. Zero-amount payouts are dropped.
    pub fn lottery_payouts(&self, settlement: &Settlement) -> Vec<Command> {
        if settlement.per_winner_amount == 0 {
            debug!(
                winners = settlement.winners.len(),
                distributable = settlement.distributable,
                "lottery split rounds to zero, no payouts"
            );
            return Vec::new();
        }
        settlement
            .winners
            .iter()
            .map(|winner| self.token_transfer(winner, settlement.per_winner_amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> CommandFactory {
        CommandFactory::new(3 * 60 * 1000)
    }

    #[test]
    fn test_liquidity_return_timing() {
        let stake_time = 1_700_000_000_000;
        let cmd = factory().liquidity_return("EQstaker", 1_000_000_000, stake_time);
        assert_eq!(cmd.kind, CommandKind::LiquidityReturn);
        assert_eq!(cmd.timing, Timing::At(stake_time + 180_000));
        assert!(!cmd.timing.is_immediate());
    }

    #[test]
    fn test_stake_release_uses_record_time() {
        let record = StakeRecord {
            address: "EQstaker".into(),
            amount: 5,
            deposited_at: 10,
            release_at: 99,
        };
        let cmd = factory().stake_release(&record);
        assert_eq!(cmd.timing, Timing::At(99));
        assert_eq!(cmd.amount, 5);
        assert_eq!(cmd.to, "EQstaker");
    }

    #[test]
    fn test_lottery_payouts() {
        let settlement = Settlement {
            settled_at: 0,
            winners: vec!["EQa".into(), "EQb".into()],
            winning_rank: 150,
            entry_count: 3,
            expired_count: 0,
            total_prize: 30,
            distributable: 27,
            retained_fee: 3,
            per_winner_amount: 13,
            undistributed_remainder: 1,
        };
        let payouts = factory().lottery_payouts(&settlement);
        assert_eq!(payouts.len(), 2);
        assert!(payouts
            .iter()
            .all(|c| c.kind == CommandKind::TokenTransfer && c.amount == 13 && c.timing.is_immediate()));

        let dust = Settlement {
            per_winner_amount: 0,
            ..settlement
        };
        assert!(factory().lottery_payouts(&dust).is_empty());
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = factory().token_transfer("EQwinner", 25_600_000_000);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "TOKEN_TRANSFER",
                "to": "EQwinner",
                "amount": 25_600_000_000u64,
                "timing": "immediate"
            })
        );

        let scheduled = factory().liquidity_return("EQlp", 1, 1_000);
        let json = serde_json::to_value(&scheduled).unwrap();
        assert_eq!(json["timing"], serde_json::json!(181_000));
        let back: Command = serde_json::from_value(json).unwrap();
        assert_eq!(back, scheduled);
    }

    #[test]
    fn test_unknown_timing_label_rejected() {
        let err = serde_json::from_str::<Timing>(r#""later""#);
        assert!(err.is_err());
    }
}
