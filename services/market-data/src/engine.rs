//! Engine wiring
//!
//! Owns the shared store, metrics, sources and blob store, and spawns the
//! discovery and refresh loops. The query operations the web layer needs
//! are exposed here so callers never reach into the loops.

use std::sync::Arc;

use persistence::{BlobStore, FileBlobStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use types::errors::SourceError;
use types::ids::ItemId;
use types::item::ItemRecord;

use crate::config::EngineConfig;
use crate::discovery::DiscoveryLoop;
use crate::metrics::{CycleMetrics, CycleSummary};
use crate::refresh::RefreshLoop;
use crate::source::{CatalogSource, HttpCatalogSource, HttpPopulationSource, PopulationSource};
use crate::store::{ItemStore, StoreError};

/// Errors constructing the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Handles to the two background loops.
pub struct EngineHandles {
    pub discovery: JoinHandle<()>,
    pub refresh: JoinHandle<()>,
}

impl EngineHandles {
    pub fn abort(&self) {
        self.discovery.abort();
        self.refresh.abort();
    }

    /// Abort both loops and wait for them to wind down.
    ///
    /// A save already handed to a blocking thread keeps running; the
    /// store's persist lock orders it against any later save.
    pub async fn shutdown(self) {
        self.abort();
        for (name, handle) in [("discovery", self.discovery), ("refresh", self.refresh)] {
            match handle.await {
                Err(e) if e.is_panic() => error!(task = name, "Loop panicked before shutdown"),
                _ => debug!(task = name, "Loop stopped"),
            }
        }
    }
}

/// The market data engine.
pub struct MarketDataEngine {
    config: EngineConfig,
    store: Arc<ItemStore>,
    metrics: Arc<CycleMetrics>,
    catalog: Arc<dyn CatalogSource>,
    population: Arc<dyn PopulationSource>,
    blobs: Arc<dyn BlobStore>,
}

impl MarketDataEngine {
    /// Build an engine over the given sources, loading any persisted
    /// store from `blobs`.
    ///
    /// A missing blob starts an empty store. A blob that exists but cannot
    /// be read or decoded is an error, so a later save never overwrites it.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn CatalogSource>,
        population: Arc<dyn PopulationSource>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, EngineError> {
        let store = ItemStore::load(blobs.as_ref(), &config)?;
        Ok(Self {
            config,
            store: Arc::new(store),
            metrics: Arc::new(CycleMetrics::new()),
            catalog,
            population,
            blobs,
        })
    }

    /// Production wiring: HTTP sources and file blobs under `save_dir`.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let catalog = Arc::new(HttpCatalogSource::new(&config)?);
        let population = Arc::new(HttpPopulationSource::new(&config)?);
        let blobs = Arc::new(FileBlobStore::new(config.save_dir.clone()));
        Self::new(config, catalog, population, blobs)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ItemStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<CycleMetrics> {
        &self.metrics
    }

    pub fn discovery_loop(&self) -> DiscoveryLoop {
        DiscoveryLoop::new(
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            Arc::clone(&self.population),
            Arc::clone(&self.metrics),
            self.config.query_pause,
            self.config.error_pause,
        )
    }

    pub fn refresh_loop(&self) -> RefreshLoop {
        RefreshLoop::new(
            Arc::clone(&self.store),
            Arc::clone(&self.population),
            Arc::clone(&self.blobs),
            Arc::clone(&self.metrics),
            self.config.query_pause,
            self.config.error_pause,
        )
    }

    /// Spawn both loops on the current runtime.
    pub fn start(&self) -> EngineHandles {
        info!(
            items = self.store.len(),
            active_threshold = self.config.active_threshold,
            "Starting market data engine"
        );
        EngineHandles {
            discovery: tokio::spawn(self.discovery_loop().run()),
            refresh: tokio::spawn(self.refresh_loop().run()),
        }
    }

    /// Write the store out now, outside the refresh cycle.
    pub fn persist_now(&self) -> Result<usize, StoreError> {
        self.store.persist(self.blobs.as_ref())
    }

    // Query surface

    /// Tradeable items, most expensive first.
    pub fn ranked_listing(&self) -> Vec<ItemId> {
        self.store.ranked_listing(self.config.tradeable_floor)
    }

    pub fn fetch(&self, id: ItemId) -> Option<ItemRecord> {
        self.store.fetch(id)
    }

    pub fn exists(&self, id: ItemId) -> bool {
        self.store.exists(id)
    }

    pub fn fuzzy_find(&self, text: &str) -> Option<ItemId> {
        self.store.fuzzy_find(text)
    }

    pub fn request_refresh(&self, id: ItemId) -> bool {
        self.store.request_refresh(id)
    }

    pub fn cycle_summary(&self) -> CycleSummary {
        self.metrics.summary()
    }
}
