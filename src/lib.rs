//! MAG Processor Library
//!
//! Reward settlement engine for the MAG incentive program: instant hash-keyed
//! rewards, the windowed lottery with its settlement scheduler, the liquidity
//! stake ledger, and the auto-buy threshold check. The engine emits commands;
//! executing them is left to a [`chain::CommandExecutor`].

pub mod api;
pub mod chain;
pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod lottery;
pub mod models;
pub mod reward;
pub mod stake;
pub mod threshold;

pub use commands::{Command, CommandFactory, CommandKind, Timing};
pub use engine::{ProcessOutcome, RewardEngine, TransactionKind};
pub use error::EngineError;
