//! Auto-buy threshold check.

use serde::Serialize;

use crate::commands::{Command, CommandFactory};
use crate::models::Amount;

/// Stateless balance check that emits a fixed-size purchase.
#[derive(Debug, Clone)]
pub struct ThresholdMonitor {
    threshold: Amount,
    buy_amount: Amount,
    target: String,
    factory: CommandFactory,
}

/// Response shape reported back to the balance-check caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoBuyOutcome {
    pub auto_buy_triggered: bool,
    pub buy_amount: Amount,
}

impl ThresholdMonitor {
    pub fn new(threshold: Amount, buy_amount: Amount, target: &str, factory: CommandFactory) -> Self {
        Self {
            threshold,
            buy_amount,
            target: target.to_string(),
            factory,
        }
    }

    /// Purchase command iff `balance >= threshold` (inclusive).
    pub fn evaluate_balance(&self, balance: Amount) -> Option<Command> {
        (balance >= self.threshold).then(|| self.factory.purchase(&self.target, self.buy_amount))
    }

    pub fn outcome(command: Option<&Command>) -> AutoBuyOutcome {
        AutoBuyOutcome {
            auto_buy_triggered: command.is_some(),
            buy_amount: command.map_or(0, |c| c.amount),
        }
    }
}
