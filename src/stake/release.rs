//! Liquidity release worker.
//!
//! Executes returns whose hold has elapsed and removes them from the ledger
//! once the executor accepts them. Failed returns stay pending and are picked
//! up again on the next poll.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ledger::StakeLedger;
use crate::chain::CommandExecutor;
use crate::clock::{format_timestamp, Clock};
use crate::commands::CommandFactory;
use crate::models::format_units;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub released: usize,
    pub failed: usize,
    /// Records re-deposited while their return was in flight
    pub superseded: usize,
}

pub async fn release_due(
    ledger: &Mutex<StakeLedger>,
    clock: &dyn Clock,
    executor: &dyn CommandExecutor,
    factory: &CommandFactory,
) -> ReleaseSummary {
    let now = clock.now_millis();
    let due = ledger.lock().due_releases(now);
    let mut summary = ReleaseSummary::default();

    for record in due {
        let command = factory.stake_release(&record);
        match executor.execute(&command).await {
            Ok(()) => {
                if ledger.lock().acknowledge_if_current(&record) {
                    info!(
                        address = %record.address,
                        amount = %format_units(record.amount),
                        release_at = %format_timestamp(record.release_at),
                        "💧 liquidity returned"
                    );
                    summary.released += 1;
                } else {
                    warn!(address = %record.address, "stake replaced during return, keeping newer deposit");
                    summary.superseded += 1;
                }
            }
            Err(e) => {
                warn!(address = %record.address, error = %e, "liquidity return failed, will retry next poll");
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Poll the ledger every `period` until the task is aborted.
pub fn spawn_release_loop(
    ledger: Arc<Mutex<StakeLedger>>,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn CommandExecutor>,
    factory: CommandFactory,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_ms = period.as_millis() as u64, "liquidity release loop started");

        loop {
            tick.tick().await;
            let summary = release_due(&ledger, clock.as_ref(), executor.as_ref(), &factory).await;
            if summary != ReleaseSummary::default() {
                debug!(?summary, "release poll");
            }
        }
    })
}
