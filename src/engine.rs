//! Poll cycle: fetch, transform, publish
//!
//! [`PollingEngine::run_cycle`] never returns an error. Every failure is
//! logged and reported through [`CycleOutcome`], and a failed cycle leaves
//! the previously published values in place.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::BridgeError;
use crate::logging::{StructuredLogger, get_logger};
use crate::store::PropertyStore;
use crate::telemetry::{TelemetrySource, parse_production};
use crate::transform::{DerivedMetrics, transform};

/// Current step of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Fetching,
    Transforming,
    Publishing,
}

/// Result of one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Success(DerivedMetrics),
    FetchFailed(String),
    ParseFailed(String),
    PublishFailed(String),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success(_))
    }
}

/// Counters kept across cycles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub total_cycles: u64,
    pub failed_cycles: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl EngineStats {
    /// `last_success` as RFC 3339, if any cycle succeeded
    pub fn last_success_rfc3339(&self) -> Option<String> {
        self.last_success.map(|t| t.to_rfc3339())
    }
}

pub struct PollingEngine {
    source: Arc<dyn TelemetrySource>,
    store: Arc<dyn PropertyStore>,
    state: watch::Sender<EngineState>,
    stats: EngineStats,
    logger: StructuredLogger,
}

impl PollingEngine {
    pub fn new(source: Arc<dyn TelemetrySource>, store: Arc<dyn PropertyStore>) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            source,
            store,
            state,
            stats: EngineStats::default(),
            logger: get_logger("engine"),
        }
    }

    /// Observe state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Run one fetch/transform/publish cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle_inner().await;
        self.set_state(EngineState::Idle);
        self.record(&outcome);
        outcome
    }

    async fn cycle_inner(&mut self) -> CycleOutcome {
        self.set_state(EngineState::Fetching);
        let body = match self.source.fetch().await {
            Ok(body) => body,
            Err(e) => return Self::classify(e),
        };

        self.set_state(EngineState::Transforming);
        let metrics = match parse_production(&body) {
            Ok(sample) => transform(&sample),
            Err(e) => return Self::classify(e),
        };

        self.set_state(EngineState::Publishing);
        match self.store.publish(metrics.to_path_updates()).await {
            Ok(()) => CycleOutcome::Success(metrics),
            Err(e) => CycleOutcome::PublishFailed(e.to_string()),
        }
    }

    fn classify(err: BridgeError) -> CycleOutcome {
        if err.is_parse_error() {
            CycleOutcome::ParseFailed(err.to_string())
        } else {
            // Anything else raised before publishing happened while fetching
            CycleOutcome::FetchFailed(err.to_string())
        }
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    fn record(&mut self, outcome: &CycleOutcome) {
        self.stats.total_cycles = self.stats.total_cycles.saturating_add(1);
        match outcome {
            CycleOutcome::Success(m) => {
                self.stats.consecutive_failures = 0;
                self.stats.last_success = Some(Utc::now());
                self.logger.debug(&format!(
                    "Published {:.1} W, {:.3} kWh, {:.3} A",
                    m.ac_power_w, m.ac_energy_forward_kwh, m.line_current_a
                ));
            }
            CycleOutcome::FetchFailed(reason)
            | CycleOutcome::ParseFailed(reason)
            | CycleOutcome::PublishFailed(reason) => {
                self.stats.failed_cycles = self.stats.failed_cycles.saturating_add(1);
                self.stats.consecutive_failures =
                    self.stats.consecutive_failures.saturating_add(1);
                self.stats.last_error = Some(reason.clone());
                let stage = match outcome {
                    CycleOutcome::FetchFailed(_) => "fetch",
                    CycleOutcome::ParseFailed(_) => "parse",
                    _ => "publish",
                };
                self.logger.error(&format!(
                    "Cycle failed during {} ({} in a row): {}",
                    stage, self.stats.consecutive_failures, reason
                ));
            }
        }
    }
}
