//! Fixed-interval runner for poll cycles
//!
//! Each cycle is awaited inline, so a slow cycle delays the next tick instead
//! of overlapping with it. A shutdown request is only observed between cycles.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::engine::{CycleOutcome, PollingEngine};
use crate::logging::{StructuredLogger, get_logger};

/// Work executed once per tick
#[async_trait]
pub trait CycleTask: Send {
    async fn run_once(&mut self) -> CycleOutcome;
}

#[async_trait]
impl CycleTask for PollingEngine {
    async fn run_once(&mut self) -> CycleOutcome {
        self.run_cycle().await
    }
}

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_runs: u64,
    pub overrun_count: u64,
}

pub struct Scheduler {
    stats: SchedulerStats,
    logger: StructuredLogger,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            stats: SchedulerStats::default(),
            logger: get_logger("scheduler"),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Run `task` every `period` until `shutdown` turns true or its sender
    /// is dropped. The first run happens immediately.
    pub async fn repeat_every<T: CycleTask + ?Sized>(
        &mut self,
        period: Duration,
        task: &mut T,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        self.logger.info(&format!(
            "Starting poll loop every {} ms",
            period.as_millis()
        ));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let _ = task.run_once().await;
                    let elapsed = started.elapsed();
                    self.stats.total_runs = self.stats.total_runs.saturating_add(1);
                    if elapsed > period {
                        self.stats.overrun_count = self.stats.overrun_count.saturating_add(1);
                        self.logger.warn(&format!(
                            "Cycle took {} ms, longer than the {} ms interval",
                            elapsed.as_millis(),
                            period.as_millis()
                        ));
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.logger.info(&format!(
            "Poll loop stopped after {} cycles ({} overruns)",
            self.stats.total_runs, self.stats.overrun_count
        ));
        self.stats
    }
}
