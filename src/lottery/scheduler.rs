//! Periodic window settlement.
//!
//! Two states: idle (no task) and running (one tokio task ticking every
//! window). At most one armed task exists at a time. Stopping only disarms
//! future ticks; a round already paying out runs to completion.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::window::{LotteryWindow, Settlement};
use crate::chain::CommandExecutor;
use crate::clock::Clock;
use crate::commands::{Command, CommandFactory};
use crate::models::format_units;

/// Result of one settle-and-dispatch round.
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub id: Uuid,
    pub settlement: Settlement,
    pub dispatched: Vec<Command>,
    pub failed: Vec<Command>,
}

/// Everything a settlement round needs; cloned into the background task.
#[derive(Clone)]
struct SettlementRound {
    window: Arc<Mutex<LotteryWindow>>,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn CommandExecutor>,
    factory: CommandFactory,
}

impl SettlementRound {
    async fn run_once(&self) -> Option<SettlementReport> {
        let now = self.clock.now_millis();
        // Drain under the lock, dispatch after releasing it
        let settled = self.window.lock().settle(now);
        let settlement = settled?;

        let id = Uuid::new_v4();
        info!(
            settlement_id = %id,
            winners = settlement.winners.len(),
            entries = settlement.entry_count,
            expired = settlement.expired_count,
            rank = settlement.winning_rank,
            pot = %format_units(settlement.total_prize),
            per_winner = %format_units(settlement.per_winner_amount),
            remainder = settlement.undistributed_remainder,
            "🎰 lottery window settled"
        );

        let mut dispatched = Vec::new();
        let mut failed = Vec::new();
        for command in self.factory.lottery_payouts(&settlement) {
            match self.executor.execute(&command).await {
                Ok(()) => dispatched.push(command),
                Err(e) => {
                    error!(settlement_id = %id, command = %command, error = %e, "lottery payout failed");
                    failed.push(command);
                }
            }
        }

        Some(SettlementReport {
            id,
            settlement,
            dispatched,
            failed,
        })
    }

    /// Tick until `shutdown` fires. The signal is only observed while
    /// waiting for the next tick, never during a round.
    async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                // Err means the sender is gone, which also disarms
                _ = shutdown.changed() => break,
            }
            if self.run_once().await.is_none() {
                info!("lottery tick: no live entries");
            }
        }

        debug!("lottery scheduler task exited");
    }
}

/// Handle on the armed background task.
struct Armed {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Armed {
    fn disarm(self) -> JoinHandle<()> {
        let _ = self.shutdown.send(true);
        self.task
    }
}

pub struct SettlementScheduler {
    round: SettlementRound,
    period: Duration,
    armed: Option<Armed>,
}

impl SettlementScheduler {
    pub fn new(
        window: Arc<Mutex<LotteryWindow>>,
        clock: Arc<dyn Clock>,
        executor: Arc<dyn CommandExecutor>,
        factory: CommandFactory,
        period: Duration,
    ) -> Self {
        Self {
            round: SettlementRound {
                window,
                clock,
                executor,
                factory,
            },
            period,
            armed: None,
        }
    }

    /// Arm the recurring trigger; the first tick fires one period from now.
    /// Any previously armed trigger is disarmed first. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) {
        if let Some(previous) = self.armed.take() {
            warn!("lottery scheduler restarted, disarming previous trigger");
            // the old task finishes any round in flight on its own
            drop(previous.disarm());
        }
        let (shutdown, signal) = watch::channel(false);
        let round = self.round.clone();
        let task = tokio::spawn(round.run(self.period, signal));
        self.armed = Some(Armed { task, shutdown });
        info!(period_ms = self.period.as_millis() as u64, "⏱️ lottery scheduler started");
    }

    /// Disarm the trigger. Returns false when already idle. A round already
    /// handing payouts to the executor keeps running until every winner has
    /// been dispatched; no further rounds start.
    pub fn stop(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                drop(armed.disarm());
                info!("lottery scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Disarm and wait for the background task, including any round in
    /// flight, to finish.
    pub async fn shutdown(&mut self) {
        if let Some(armed) = self.armed.take() {
            if let Err(e) = armed.disarm().await {
                error!(error = %e, "lottery scheduler task failed");
            }
            info!("lottery scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.armed
            .as_ref()
            .map_or(false, |armed| !armed.task.is_finished())
    }

    /// Settle and dispatch right now, independent of the timer.
    pub async fn tick(&self) -> Option<SettlementReport> {
        self.round.run_once().await
    }
}

impl Drop for SettlementScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::EngineError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingExecutor {
        executed: Mutex<Vec<Command>>,
        fail_for: Option<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, command: &Command) -> Result<(), EngineError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_for.as_deref() == Some(command.to.as_str()) {
                return Err(EngineError::network("executor unavailable"));
            }
            self.executed.lock().push(command.clone());
            Ok(())
        }
    }

    const WINDOW: Duration = Duration::from_secs(24 * 60);

    fn scheduler(
        executor: Arc<RecordingExecutor>,
    ) -> (SettlementScheduler, Arc<Mutex<LotteryWindow>>, Arc<ManualClock>) {
        let window = Arc::new(Mutex::new(LotteryWindow::new(
            WINDOW.as_millis() as i64,
            10,
            1_000,
        )));
        let clock = Arc::new(ManualClock::new(0));
        let scheduler = SettlementScheduler::new(
            window.clone(),
            clock.clone(),
            executor,
            CommandFactory::new(180_000),
            WINDOW,
        );
        (scheduler, window, clock)
    }

    #[tokio::test]
    async fn test_tick_dispatches_to_winners() {
        let executor = Arc::new(RecordingExecutor::default());
        let (scheduler, window, _clock) = scheduler(executor.clone());
        {
            let mut w = window.lock();
            w.record("EQa", 50, 0).unwrap();
            w.record("EQb", 150, 0).unwrap();
            w.record("EQc", 100, 0).unwrap();
        }

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.settlement.per_winner_amount, 27);
        assert_eq!(report.dispatched.len(), 1);
        assert!(report.failed.is_empty());

        let executed = executor.executed.lock().clone();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].to, "EQb");
        assert_eq!(executed[0].amount, 27);

        // drained: the next tick has nothing to pay
        assert!(scheduler.tick().await.is_none());
        assert_eq!(executor.executed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_payout_is_reported_not_retried() {
        let executor = Arc::new(RecordingExecutor {
            fail_for: Some("EQa".into()),
            ..Default::default()
        });
        let (scheduler, window, _clock) = scheduler(executor.clone());
        {
            let mut w = window.lock();
            w.record("EQa", 9, 0).unwrap();
            w.record("EQb", 9, 0).unwrap();
        }

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.dispatched.len(), 1);
        assert!(window.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let executor = Arc::new(RecordingExecutor::default());
        let (mut scheduler, _window, _clock) = scheduler(executor);

        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());

        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_settles_each_window() {
        let executor = Arc::new(RecordingExecutor::default());
        let (mut scheduler, window, clock) = scheduler(executor.clone());
        window.lock().record("EQfirst", 3, 0).unwrap();

        scheduler.start();
        // restarting must not leave two triggers behind
        scheduler.start();

        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert_eq!(executor.executed.lock().len(), 1);
        assert_eq!(executor.executed.lock()[0].to, "EQfirst");

        clock.advance_by(WINDOW.as_millis() as i64);
        window
            .lock()
            .record("EQsecond", 1, clock.now_millis())
            .unwrap();
        tokio::time::sleep(WINDOW).await;
        let executed = executor.executed.lock().clone();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[1].to, "EQsecond");

        scheduler.stop();
        window
            .lock()
            .record("EQlate", 1, clock.now_millis())
            .unwrap();
        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(executor.executed.lock().len(), 2);
        assert_eq!(window.lock().len(), 1);
    }

    fn tied_window(window: &Mutex<LotteryWindow>) {
        let mut w = window.lock();
        w.record("EQa", 9, 0).unwrap();
        w.record("EQb", 9, 0).unwrap();
        w.record("EQc", 9, 0).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_payout_finishes_round() {
        let executor = Arc::new(RecordingExecutor {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let (mut scheduler, window, _clock) = scheduler(executor.clone());
        tied_window(&window);

        scheduler.start();
        // first payout done, second in flight
        tokio::time::sleep(WINDOW + Duration::from_secs(6)).await;
        assert_eq!(executor.executed.lock().len(), 1);
        assert!(window.lock().is_empty());

        assert!(scheduler.stop());
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        let paid: Vec<String> = executor.executed.lock().iter().map(|c| c.to.clone()).collect();
        assert_eq!(paid, vec!["EQa", "EQb", "EQc"]);

        // no further rounds after stop
        window.lock().record("EQlate", 1, 0).unwrap();
        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(executor.executed.lock().len(), 3);
        assert_eq!(window.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_round_in_flight() {
        let executor = Arc::new(RecordingExecutor {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let (mut scheduler, window, _clock) = scheduler(executor.clone());
        tied_window(&window);

        scheduler.start();
        tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;
        assert!(executor.executed.lock().is_empty());

        scheduler.shutdown().await;
        assert_eq!(executor.executed.lock().len(), 3);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_does_not_cut_payouts() {
        let executor = Arc::new(RecordingExecutor {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let (mut scheduler, window, _clock) = scheduler(executor.clone());
        tied_window(&window);

        scheduler.start();
        tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(executor.executed.lock().len(), 3);
    }
}
