//! Windowed Lottery
//!
//! Entries accumulate in a [`LotteryWindow`] keyed by participant. Every
//! window duration the [`SettlementScheduler`] settles it: the highest
//! digit-sum rank wins, ties split the pot after the protocol fee, and the
//! window is cleared.

pub mod scheduler;
pub mod window;

pub use scheduler::*;
pub use window::*;
