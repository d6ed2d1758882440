use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::CollectorSettings;
use crate::error::AppError;
use crate::models::{PriceObservation, WriteMode};
use crate::services::price_feed::QuoteSource;
use crate::services::price_storage::HistoryStore;

/// What to do when the timer fires while an earlier cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Start another cycle anyway; writes from both may interleave.
    Allow,
    /// Drop the tick.
    Skip,
}

impl FromStr for OverlapPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(OverlapPolicy::Allow),
            "skip" => Ok(OverlapPolicy::Skip),
            other => Err(AppError::ConfigError(format!("unknown overlap policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    RunningCycle,
}

/// Outcome of one fetch-and-persist pass.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub written: Vec<String>,
    /// Assets the upstream did not return a usable quote for.
    pub skipped: Vec<String>,
    /// Assets whose write failed.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub state: SchedulerState,
    pub cycles_in_flight: usize,
    pub cycles_started: u64,
    pub ticks_skipped: u64,
    pub interval_seconds: u64,
    pub overlap_policy: OverlapPolicy,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

/// Periodic price collection: one cycle at startup, then one per interval.
pub struct PriceCollector {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn HistoryStore>,
    tracked_assets: Vec<String>,
    write_mode: WriteMode,
    interval: Duration,
    overlap_policy: OverlapPolicy,
    in_flight: AtomicUsize,
    cycles_started: AtomicU64,
    ticks_skipped: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
    last_error: RwLock<Option<String>>,
}

/// Decrements the in-flight counter even if the cycle task is aborted.
struct InFlightGuard(Arc<PriceCollector>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PriceCollector {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn HistoryStore>,
        settings: &CollectorSettings,
    ) -> Self {
        Self {
            source,
            store,
            tracked_assets: settings.tracked_assets.clone(),
            write_mode: settings.write_mode,
            interval: settings.interval(),
            overlap_policy: settings.overlap_policy,
            in_flight: AtomicUsize::new(0),
            cycles_started: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            last_report: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn tracked_assets(&self) -> &[String] {
        &self.tracked_assets
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SchedulerState::RunningCycle
        } else {
            SchedulerState::Idle
        }
    }

    pub async fn status(&self) -> CollectorStatus {
        CollectorStatus {
            state: self.state(),
            cycles_in_flight: self.in_flight.load(Ordering::SeqCst),
            cycles_started: self.cycles_started.load(Ordering::SeqCst),
            ticks_skipped: self.ticks_skipped.load(Ordering::SeqCst),
            interval_seconds: self.interval.as_secs(),
            overlap_policy: self.overlap_policy,
            last_report: self.last_report.read().await.clone(),
            last_error: self.last_error.read().await.clone(),
        }
    }

    /// Fetch quotes for every tracked asset and persist one observation each.
    ///
    /// Assets missing from the upstream response are skipped; a failed write
    /// for one asset does not stop the others. Fails only when the fetch fails
    /// or when no write succeeded at all.
    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let started_at = Utc::now();
        info!("Starting collection cycle for {} assets", self.tracked_assets.len());

        let quotes = self.source.fetch_quotes(&self.tracked_assets).await?;
        let observed_at = Utc::now();

        let mut written = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut last_write_error = None;

        for asset_id in &self.tracked_assets {
            let Some(quote) = quotes.get(asset_id) else {
                warn!("Skipping {}: upstream returned no usable quote", asset_id);
                skipped.push(asset_id.clone());
                continue;
            };

            let observation = match PriceObservation::from_quote(asset_id, quote, observed_at) {
                Ok(observation) => observation,
                Err(e) => {
                    warn!("Skipping {}: {}", asset_id, e);
                    skipped.push(asset_id.clone());
                    continue;
                }
            };

            match self.store.write(&observation, self.write_mode).await {
                Ok(()) => written.push(asset_id.clone()),
                Err(e) => {
                    error!("Failed to store observation for {}: {}", asset_id, e);
                    failed.push(asset_id.clone());
                    last_write_error = Some(e);
                }
            }
        }

        if written.is_empty() {
            if let Some(e) = last_write_error {
                return Err(e);
            }
        }

        Ok(CycleReport {
            started_at,
            finished_at: Utc::now(),
            written,
            skipped,
            failed,
        })
    }

    /// One cycle with failures contained and recorded.
    async fn execute_cycle(&self) {
        match self.run_cycle().await {
            Ok(report) => {
                info!(
                    "Collection cycle finished: {} written, {} skipped, {} failed",
                    report.written.len(),
                    report.skipped.len(),
                    report.failed.len()
                );
                *self.last_report.write().await = Some(report);
                *self.last_error.write().await = None;
            }
            Err(e) => {
                error!("Collection cycle failed: {}", e);
                *self.last_error.write().await = Some(e.to_string());
            }
        }
    }

    /// Start a cycle on its own task, honouring the overlap policy.
    /// Returns `None` when the tick was skipped.
    pub fn trigger(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        match self.overlap_policy {
            OverlapPolicy::Allow => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
            }
            OverlapPolicy::Skip => {
                if self
                    .in_flight
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    self.ticks_skipped.fetch_add(1, Ordering::SeqCst);
                    warn!("Previous collection cycle still running, skipping this tick");
                    return None;
                }
            }
        }
        self.cycles_started.fetch_add(1, Ordering::SeqCst);

        let guard = InFlightGuard(Arc::clone(self));
        Some(tokio::spawn(async move {
            guard.0.execute_cycle().await;
            drop(guard);
        }))
    }

    /// Runs for the lifetime of the task: first cycle immediately, then every interval.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Starting price collector (interval: {}s, overlap: {:?}, mode: {:?})",
            self.interval.as_secs(),
            self.overlap_policy,
            self.write_mode
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.trigger();
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_policy_parsing() {
        assert_eq!("allow".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Allow);
        assert_eq!(" Skip ".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Skip);
        assert!("queue".parse::<OverlapPolicy>().is_err());
    }
}
