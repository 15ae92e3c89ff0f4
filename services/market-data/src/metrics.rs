//! Observability and metrics for the Market Data Engine
//!
//! Published cycle metadata (eligible items, aggregate population, last
//! cycle duration and completion time) plus failure counters for
//! Prometheus-style monitoring. Values are plain atomics: the web layer
//! reads them without touching the item store's lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Process-wide metrics shared by the background loops.
#[derive(Debug)]
pub struct CycleMetrics {
    // Published cycle metadata
    pub eligible_items: AtomicU64,
    pub total_population: AtomicU64,
    pub last_cycle_ms: AtomicU64,
    /// Unix milliseconds; 0 until the first cycle completes.
    pub last_completed_ms: AtomicI64,

    // Counters
    pub cycles_completed: AtomicU64,
    pub degenerate_cycles: AtomicU64,
    pub items_discovered: AtomicU64,
    pub population_queries: AtomicU64,
    pub query_failures: AtomicU64,
    pub catalog_failures: AtomicU64,
    pub zero_population_reports: AtomicU64,
    pub persist_failures: AtomicU64,
}

/// Plain copy of the published cycle metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub eligible_items: u64,
    pub total_population: u64,
    pub last_cycle: Duration,
    pub last_completed: Option<DateTime<Utc>>,
}

impl CycleMetrics {
    pub fn new() -> Self {
        Self {
            eligible_items: AtomicU64::new(0),
            total_population: AtomicU64::new(0),
            last_cycle_ms: AtomicU64::new(0),
            last_completed_ms: AtomicI64::new(0),
            cycles_completed: AtomicU64::new(0),
            degenerate_cycles: AtomicU64::new(0),
            items_discovered: AtomicU64::new(0),
            population_queries: AtomicU64::new(0),
            query_failures: AtomicU64::new(0),
            catalog_failures: AtomicU64::new(0),
            zero_population_reports: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
        }
    }

    /// Record the number of items picked up by the current cycle.
    pub fn set_eligible_items(&self, count: u64) {
        self.eligible_items.store(count, Ordering::Relaxed);
    }

    /// Record a finished refresh cycle.
    pub fn record_cycle(&self, total_population: u64, elapsed: Duration, completed: DateTime<Utc>) {
        self.total_population.store(total_population, Ordering::Relaxed);
        self.last_cycle_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.last_completed_ms
            .store(completed.timestamp_millis(), Ordering::Relaxed);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degenerate_cycle(&self) {
        self.degenerate_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self) {
        self.items_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, ok: bool) {
        self.population_queries.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.query_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_catalog_failure(&self) {
        self.catalog_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_zero_population(&self) {
        self.zero_population_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Published cycle metadata.
    pub fn summary(&self) -> CycleSummary {
        let completed_ms = self.last_completed_ms.load(Ordering::Relaxed);
        CycleSummary {
            eligible_items: self.eligible_items.load(Ordering::Relaxed),
            total_population: self.total_population.load(Ordering::Relaxed),
            last_cycle: Duration::from_millis(self.last_cycle_ms.load(Ordering::Relaxed)),
            last_completed: (completed_ms != 0)
                .then(|| DateTime::from_timestamp_millis(completed_ms))
                .flatten(),
        }
    }

    /// Export metrics as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("eligible_items".to_string(), self.eligible_items.load(Ordering::Relaxed));
        m.insert("total_population".to_string(), self.total_population.load(Ordering::Relaxed));
        m.insert("last_cycle_ms".to_string(), self.last_cycle_ms.load(Ordering::Relaxed));
        m.insert("cycles_completed".to_string(), self.cycles_completed.load(Ordering::Relaxed));
        m.insert("degenerate_cycles".to_string(), self.degenerate_cycles.load(Ordering::Relaxed));
        m.insert("items_discovered".to_string(), self.items_discovered.load(Ordering::Relaxed));
        m.insert("population_queries".to_string(), self.population_queries.load(Ordering::Relaxed));
        m.insert("query_failures".to_string(), self.query_failures.load(Ordering::Relaxed));
        m.insert("catalog_failures".to_string(), self.catalog_failures.load(Ordering::Relaxed));
        m.insert(
            "zero_population_reports".to_string(),
            self.zero_population_reports.load(Ordering::Relaxed),
        );
        m.insert("persist_failures".to_string(), self.persist_failures.load(Ordering::Relaxed));
        m
    }
}

impl Default for CycleMetrics {
    fn default() -> Self {
        Self::new()
    }
}
