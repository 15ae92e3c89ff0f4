//! Refresh Loop
//!
//! One cycle per iteration, four phases:
//!
//! ```text
//!  ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌─────────┐
//!  │ Snapshot │──▶│ Query        │──▶│ Apply     │──▶│ Persist │
//!  │ (write,  │   │ (no lock,    │   │ (write,   │   │ (read,  │
//!  │  brief)  │   │  slow)       │   │  brief)   │   │  brief) │
//!  └──────────┘   └──────────────┘   └───────────┘   └─────────┘
//! ```
//!
//! The snapshot detaches eligible ids and counts from the store so the
//! slow outbound queries never hold the lock. The apply phase then
//! updates every snapshotted record atomically: population, share,
//! price, histories, hi/lo.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use persistence::BlobStore;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use types::ids::ItemId;

use crate::metrics::CycleMetrics;
use crate::source::PopulationSource;
use crate::store::ItemStore;

/// What one refresh cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub eligible: usize,
    pub total_population: u64,
    /// Records that got a new price (0 for a degenerate cycle).
    pub priced: usize,
    pub query_failures: usize,
    pub zero_reports: usize,
    pub persisted: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    /// A cycle with eligible items but no aggregate population.
    pub fn is_degenerate(&self) -> bool {
        self.eligible > 0 && self.total_population == 0
    }
}

/// Background task that re-prices eligible items.
pub struct RefreshLoop {
    store: Arc<ItemStore>,
    population: Arc<dyn PopulationSource>,
    blobs: Arc<dyn BlobStore>,
    metrics: Arc<CycleMetrics>,
    query_pause: Duration,
    error_pause: Duration,
}

impl RefreshLoop {
    pub fn new(
        store: Arc<ItemStore>,
        population: Arc<dyn PopulationSource>,
        blobs: Arc<dyn BlobStore>,
        metrics: Arc<CycleMetrics>,
        query_pause: Duration,
        error_pause: Duration,
    ) -> Self {
        Self {
            store,
            population,
            blobs,
            metrics,
            query_pause,
            error_pause,
        }
    }

    /// Run cycles back to back, forever.
    ///
    /// Cadence comes from the per-query pacing, so a cycle with nothing
    /// eligible waits `error_pause` instead of spinning.
    pub async fn run(self) {
        info!("Refresh loop started");
        loop {
            let report = self.run_cycle().await;
            if report.eligible == 0 {
                sleep(self.error_pause).await;
            }
        }
    }

    /// Run one full cycle: snapshot, query, apply, persist.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();

        // Snapshot phase
        let mut populations = self.store.snapshot_eligible();
        let eligible = populations.len();
        self.metrics.set_eligible_items(eligible as u64);
        info!(
            eligible,
            last_total = self.metrics.summary().total_population,
            "Start refresh cycle"
        );

        // Query phase
        let (total_population, query_failures, zero_reports) =
            self.collect_populations(&mut populations).await;

        // Apply phase
        let now = Utc::now();
        if eligible > 0 && total_population == 0 {
            error!(
                eligible,
                "Aggregate population is zero; storing counts without re-pricing"
            );
            self.metrics.record_degenerate_cycle();
        }
        let applied = self.store.apply_cycle(&populations, total_population, now);
        debug!(updated = applied.updated, priced = applied.priced, "Refresh applied");

        // Persist phase
        let persisted = self.persist().await;

        let elapsed = start.elapsed();
        self.metrics.record_cycle(total_population, elapsed, Utc::now());
        info!(
            eligible,
            total_population,
            priced = applied.priced,
            query_failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Refresh cycle complete"
        );

        CycleReport {
            eligible,
            total_population,
            priced: applied.priced,
            query_failures,
            zero_reports,
            persisted,
            elapsed,
        }
    }

    /// Query every snapshotted item, replacing counts in place. A failed
    /// query keeps the previous count.
    ///
    /// Returns `(total, failures, zero_reports)`.
    async fn collect_populations(
        &self,
        populations: &mut BTreeMap<ItemId, u64>,
    ) -> (u64, usize, usize) {
        let mut total: u64 = 0;
        let mut failures = 0;
        let mut zeros = 0;

        for (id, count) in populations.iter_mut() {
            let result = self.population.query_population(*id).await;
            self.metrics.record_query(result.is_ok());
            match result {
                Ok(0) => {
                    zeros += 1;
                    self.metrics.record_zero_population();
                    warn!(
                        item = %id,
                        previous = *count,
                        "Likely an error: received 0 players for an eligible item"
                    );
                    *count = 0;
                }
                Ok(players) => *count = players,
                Err(e) => {
                    failures += 1;
                    let previous = *count;
                    if e.is_upstream_unavailable() {
                        warn!(item = %id, error = %e, previous, "Population query failed");
                    } else {
                        error!(item = %id, error = %e, previous, "Population query failed");
                    }
                    sleep(self.error_pause).await;
                }
            }

            total = total.saturating_add(*count);
            sleep(self.query_pause).await;
        }

        (total, failures, zeros)
    }

    /// Write the store out. Failures are logged and counted; the next
    /// cycle tries again.
    async fn persist(&self) -> bool {
        let store = Arc::clone(&self.store);
        let blobs = Arc::clone(&self.blobs);
        match tokio::task::spawn_blocking(move || store.persist(blobs.as_ref())).await {
            Ok(Ok(bytes)) => {
                debug!(bytes, "Store persisted");
                true
            }
            Ok(Err(e)) => {
                self.metrics.record_persist_failure();
                error!(error = %e, "Failed to persist item store");
                false
            }
            Err(e) => {
                self.metrics.record_persist_failure();
                error!(error = %e, "Persist task did not complete");
                false
            }
        }
    }
}
