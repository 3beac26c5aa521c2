//! HTTP surface: transaction processing, balance checks and read-only views
//! of the lottery window and stake ledger.

pub mod routes;

pub use routes::{create_router, ApiError, AppState};
