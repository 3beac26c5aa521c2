//! Instant Rewards
//!
//! Hash-keyed reward lookup for qualifying transfers, plus the digit-sum rank
//! used by the windowed lottery.
//!
//! - `digest` extracts the trailing digit and the digit sum from a hash
//! - `table` maps a digit to a reward (doubling ladder, digit 0 on top)
//! - `calculator` combines the two

pub mod calculator;
pub mod digest;
pub mod table;

pub use calculator::*;
pub use digest::*;
pub use table::*;
