//! In-process fakes for the upstream sources and blob storage.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use market_data::source::{CatalogSource, PopulationSource};
use market_data::store::ItemStore;
use market_data::EngineConfig;
use persistence::{BlobStore, PersistenceError};
use tokio::sync::{Notify, Semaphore};
use types::errors::SourceError;
use types::ids::ItemId;
use types::item::{CatalogEntry, ItemRecord};

pub fn unavailable() -> SourceError {
    SourceError::Status {
        status: 503,
        url: "/fake".to_string(),
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        query_pause: Duration::from_millis(100),
        error_pause: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

pub fn test_store() -> ItemStore {
    ItemStore::with_config(&test_config())
}

/// Insert a record with the given population.
pub fn seed(store: &ItemStore, id: u32, name: &str, population: u64) {
    let mut record = ItemRecord::new(ItemId::new(id), name);
    record.population = population;
    store.upsert(ItemId::new(id), record);
}

// ── Catalog ─────────────────────────────────────────────────────────

pub struct FakeCatalog {
    listing: Mutex<Result<Vec<CatalogEntry>, SourceError>>,
}

impl FakeCatalog {
    pub fn new(entries: &[(u32, &str)]) -> Self {
        Self {
            listing: Mutex::new(Ok(entries
                .iter()
                .map(|(id, name)| CatalogEntry::new(*id, *name))
                .collect())),
        }
    }

    pub fn failing() -> Self {
        Self {
            listing: Mutex::new(Err(unavailable())),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError> {
        self.listing.lock().unwrap().clone()
    }
}

// ── Population ──────────────────────────────────────────────────────

/// Scripted population counts. Unknown ids report zero players.
///
/// When gated, every query signals `entered` and then waits for a permit
/// on `gate`, so a test can hold a refresh cycle inside its query phase.
#[derive(Default)]
pub struct FakePopulation {
    counts: Mutex<HashMap<ItemId, Result<u64, SourceError>>>,
    calls: Mutex<Vec<ItemId>>,
    gate: Option<Arc<Semaphore>>,
    pub entered: Arc<Notify>,
}

impl FakePopulation {
    pub fn new(counts: &[(u32, u64)]) -> Self {
        let fake = Self::default();
        for (id, count) in counts {
            fake.set(*id, *count);
        }
        fake
    }

    pub fn gated(counts: &[(u32, u64)], gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(counts)
        }
    }

    pub fn set(&self, id: u32, count: u64) {
        self.counts.lock().unwrap().insert(ItemId::new(id), Ok(count));
    }

    pub fn fail(&self, id: u32) {
        self.counts
            .lock()
            .unwrap()
            .insert(ItemId::new(id), Err(unavailable()));
    }

    pub fn calls(&self) -> Vec<ItemId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl PopulationSource for FakePopulation {
    async fn query_population(&self, id: ItemId) -> Result<u64, SourceError> {
        self.calls.lock().unwrap().push(id);
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| SourceError::Transport(e.to_string()))?;
        }
        self.counts
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or(Ok(0))
    }
}

// ── Blobs ───────────────────────────────────────────────────────────

/// Blob store whose writes always fail.
pub struct FailingBlobStore;

impl BlobStore for FailingBlobStore {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _blob: &[u8]) -> Result<(), PersistenceError> {
        Err(PersistenceError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}
