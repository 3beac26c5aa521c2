//! Liquidity Stakes
//!
//! Deposits are held for a fixed number of interval units and then returned.
//! The ledger is in-memory only; nothing survives a restart.

pub mod ledger;
pub mod release;

pub use ledger::*;
pub use release::*;
