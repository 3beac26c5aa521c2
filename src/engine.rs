//! Reward Engine
//!
//! Entry point for transaction events. Classifies a transaction, runs the
//! matching mechanism and returns the resulting command, if any. The engine
//! performs no I/O; commands are handed back to the caller.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chain::CommandExecutor;
use crate::clock::Clock;
use crate::commands::{Command, CommandFactory};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lottery::{LotteryWindow, SettlementScheduler};
use crate::models::{format_units, Amount, Asset, TransactionRecord};
use crate::reward::RewardCalculator;
use crate::stake::StakeLedger;
use crate::threshold::ThresholdMonitor;

/// Which mechanism a transaction qualifies for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Native transfer of the instant-lottery price
    InstantLottery,
    /// Liquidity-token deposit of the stake amount
    LiquidityStake,
    /// Reward-token transfer of the window-lottery stake
    LotteryEntry,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub kind: TransactionKind,
    pub command: Option<Command>,
    /// Rank recorded for a window-lottery entry
    pub lottery_rank: Option<u64>,
}

pub struct RewardEngine {
    config: Arc<EngineConfig>,
    calculator: RewardCalculator,
    factory: CommandFactory,
    monitor: ThresholdMonitor,
    window: Arc<Mutex<LotteryWindow>>,
    ledger: Arc<Mutex<StakeLedger>>,
    clock: Arc<dyn Clock>,
}

impl RewardEngine {
    pub fn new(config: Arc<EngineConfig>, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        config.validate()?;

        let factory = CommandFactory::new(config.liquidity_hold_millis());
        let monitor = ThresholdMonitor::new(
            config.auto_buy_threshold,
            config.auto_buy_amount,
            &config.auto_buy_target,
            factory.clone(),
        );
        let window = LotteryWindow::new(
            config.window_millis(),
            config.lottery_entry_stake,
            config.fee_retention_bps,
        );
        let ledger = StakeLedger::new(config.liquidity_hold_millis());

        Ok(Self {
            calculator: RewardCalculator::with_unit(config.reward_unit),
            factory,
            monitor,
            window: Arc::new(Mutex::new(window)),
            ledger: Arc::new(Mutex::new(ledger)),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calculator(&self) -> &RewardCalculator {
        &self.calculator
    }

    pub fn factory(&self) -> &CommandFactory {
        &self.factory
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn window(&self) -> Arc<Mutex<LotteryWindow>> {
        self.window.clone()
    }

    pub fn ledger(&self) -> Arc<Mutex<StakeLedger>> {
        self.ledger.clone()
    }

    pub fn classify(&self, tx: &TransactionRecord) -> TransactionKind {
        let cfg = &self.config;
        match &tx.asset {
            Asset::Native if tx.value == cfg.instant_lottery_price => {
                TransactionKind::InstantLottery
            }
            Asset::Jetton { master }
                if *master == cfg.liquidity_token && tx.value == cfg.liquidity_stake_amount =>
            {
                TransactionKind::LiquidityStake
            }
            Asset::Jetton { master }
                if *master == cfg.reward_token && tx.value == cfg.lottery_entry_stake =>
            {
                TransactionKind::LotteryEntry
            }
            _ => TransactionKind::Unrecognized,
        }
    }

    /// Apply one transaction.
    ///
    /// - instant lottery: immediate reward transfer keyed by the hash
    /// - liquidity stake: ledger upsert plus a return timed at deposit + hold
    /// - lottery entry: window upsert with the hash's digit-sum rank
    pub fn process(&self, tx: &TransactionRecord) -> Result<ProcessOutcome, EngineError> {
        let kind = self.classify(tx);
        let mut outcome = ProcessOutcome {
            kind,
            command: None,
            lottery_rank: None,
        };

        match kind {
            TransactionKind::InstantLottery => {
                let reward = self.calculator.reward_for(&tx.hash)?;
                info!(
                    hash = %tx.hash,
                    to = %tx.sender,
                    reward = %format_units(reward),
                    "🎲 instant lottery reward"
                );
                outcome.command = Some(self.factory.token_transfer(&tx.sender, reward));
            }
            TransactionKind::LiquidityStake => {
                if tx.timestamp <= 0 {
                    return Err(EngineError::invalid_input(format!(
                        "liquidity stake {} has no deposit timestamp",
                        tx.hash
                    )));
                }
                let replaced = self
                    .ledger
                    .lock()
                    .record_deposit(&tx.sender, tx.value, tx.timestamp)?;
                if replaced.is_some() {
                    info!(address = %tx.sender, "stake overwritten by newer deposit");
                }
                outcome.command =
                    Some(self.factory.liquidity_return(&tx.sender, tx.value, tx.timestamp));
            }
            TransactionKind::LotteryEntry => {
                let rank = self.calculator.lottery_rank(&tx.hash)?;
                let now = self.clock.now_millis();
                let replaced = self.window.lock().record(&tx.sender, rank, now)?;
                info!(
                    participant = %tx.sender,
                    rank,
                    replaced = replaced.is_some(),
                    "🎟️ lottery entry recorded"
                );
                outcome.lottery_rank = Some(rank);
            }
            TransactionKind::Unrecognized => {
                debug!(hash = %tx.hash, value = tx.value, "transaction does not qualify");
            }
        }

        Ok(outcome)
    }

    pub fn evaluate_balance(&self, balance: Amount) -> Option<Command> {
        self.monitor.evaluate_balance(balance)
    }

    /// Scheduler settling this engine's window every window duration.
    pub fn settlement_scheduler(&self, executor: Arc<dyn CommandExecutor>) -> SettlementScheduler {
        SettlementScheduler::new(
            self.window.clone(),
            self.clock.clone(),
            executor,
            self.factory.clone(),
            self.config.window_duration(),
        )
    }
}
