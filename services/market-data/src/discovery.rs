//! Discovery Loop
//!
//! Learns about new catalog items and keeps dormant items' populations
//! fresh. Each pass:
//! 1. Fetch the full catalog.
//! 2. New ids: query the population once and insert a fresh record (a
//!    failed query still inserts the record, with zero population).
//! 3. Known ids that are not eligible for refresh cycles: query and store
//!    the population only.
//!
//! Eligible items are left alone; the refresh loop owns them. Outbound
//! queries are paced by `query_pause`, and a failed query is followed by
//! `error_pause`. The store lock is only taken for the individual inserts
//! and updates, never across a query.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use types::errors::SourceError;
use types::ids::ItemId;
use types::item::ItemRecord;

use crate::metrics::CycleMetrics;
use crate::source::{CatalogSource, PopulationSource};
use crate::store::ItemStore;

/// Counts from one discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryPass {
    pub catalog_size: usize,
    pub discovered: usize,
    pub dormant_updated: usize,
    pub query_failures: usize,
}

/// Background task that grows the store from the upstream catalog.
pub struct DiscoveryLoop {
    store: Arc<ItemStore>,
    catalog: Arc<dyn CatalogSource>,
    population: Arc<dyn PopulationSource>,
    metrics: Arc<CycleMetrics>,
    query_pause: Duration,
    error_pause: Duration,
}

impl DiscoveryLoop {
    pub fn new(
        store: Arc<ItemStore>,
        catalog: Arc<dyn CatalogSource>,
        population: Arc<dyn PopulationSource>,
        metrics: Arc<CycleMetrics>,
        query_pause: Duration,
        error_pause: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            population,
            metrics,
            query_pause,
            error_pause,
        }
    }

    /// Run passes forever. Errors are logged and retried after
    /// `error_pause`; this never returns.
    pub async fn run(self) {
        info!("Discovery loop started");
        loop {
            match self.run_once().await {
                // A pass over an all-eligible catalog makes no queries
                Ok(_) => sleep(self.query_pause).await,
                Err(e) => {
                    warn!(error = %e, "Catalog listing failed, retrying");
                    sleep(self.error_pause).await;
                }
            }
        }
    }

    /// One discovery pass over the full catalog.
    ///
    /// Fails only if the catalog itself cannot be listed; per-item query
    /// failures are absorbed and counted.
    pub async fn run_once(&self) -> Result<DiscoveryPass, SourceError> {
        let catalog = match self.catalog.list_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                self.metrics.record_catalog_failure();
                return Err(e);
            }
        };

        let mut pass = DiscoveryPass {
            catalog_size: catalog.len(),
            ..DiscoveryPass::default()
        };
        info!(catalog_size = pass.catalog_size, "Start discovery pass");

        for entry in catalog {
            match self.store.eligibility(entry.id) {
                None => {
                    let mut record = ItemRecord::new(entry.id, entry.name);
                    record.population = self.query(&mut pass, entry.id).await.unwrap_or(0);
                    info!(
                        item = %entry.id,
                        name = %record.name,
                        players = record.population,
                        "Found new item"
                    );
                    if self.store.insert_if_absent(record) {
                        pass.discovered += 1;
                        self.metrics.record_discovered();
                    }
                }
                Some(false) => {
                    if let Some(players) = self.query(&mut pass, entry.id).await {
                        if self.store.update_dormant_population(entry.id, players) {
                            pass.dormant_updated += 1;
                        }
                    }
                }
                Some(true) => continue,
            }
        }

        info!(
            discovered = pass.discovered,
            dormant_updated = pass.dormant_updated,
            query_failures = pass.query_failures,
            "Discovery pass complete"
        );
        Ok(pass)
    }

    /// Query one population, pacing afterwards. `None` on failure, after
    /// the error pause.
    async fn query(&self, pass: &mut DiscoveryPass, id: ItemId) -> Option<u64> {
        let result = self.population.query_population(id).await;
        self.metrics.record_query(result.is_ok());
        match result {
            Ok(players) => {
                debug!(item = %id, players, "Population fetched");
                sleep(self.query_pause).await;
                Some(players)
            }
            Err(e) => {
                pass.query_failures += 1;
                warn!(item = %id, error = %e, "Population query failed");
                sleep(self.error_pause).await;
                None
            }
        }
    }
}
