//! Item Record Store
//!
//! Owns every `ItemRecord` behind a single reader/writer lock. Readers
//! (queries, persistence) share the lock; every mutation takes it
//! exclusively and leaves each record fully updated before releasing it,
//! so no reader ever sees a population change without the matching price
//! fields.
//!
//! Records are created once and never removed.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use persistence::{BlobStore, PersistenceError};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};
use types::ids::ItemId;
use types::item::{ItemRecord, PriceSample, ShareSample};

use crate::config::{EngineConfig, STORE_BLOB_KEY};
use crate::pricing;

/// Errors loading or persisting the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// New fields for one record, produced by a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshUpdate {
    pub population: u64,
    /// `None` when the cycle's aggregate population was zero; only the
    /// population is stored in that case.
    pub market_share: Option<Decimal>,
    pub at: DateTime<Utc>,
}

/// Outcome of applying a whole refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleApplied {
    /// Records whose population was written.
    pub updated: usize,
    /// Records that also got a new share, price and history sample.
    pub priced: usize,
}

/// Concurrent mapping from item id to its current record.
pub struct ItemStore {
    items: RwLock<BTreeMap<ItemId, ItemRecord>>,
    /// Serializes whole persists (snapshot and save) so the last save to
    /// finish always carries the newest state.
    persist_lock: Mutex<()>,
    active_threshold: u64,
    history_window: Duration,
}

impl ItemStore {
    /// Create an empty store.
    pub fn new(active_threshold: u64, history_window: Duration) -> Self {
        Self::from_records(BTreeMap::new(), active_threshold, history_window)
    }

    /// Create an empty store with thresholds from `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::new(config.active_threshold, config.history_window)
    }

    fn from_records(
        items: BTreeMap<ItemId, ItemRecord>,
        active_threshold: u64,
        history_window: Duration,
    ) -> Self {
        Self {
            items: RwLock::new(items),
            persist_lock: Mutex::new(()),
            active_threshold,
            history_window,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ItemId, ItemRecord>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ItemId, ItemRecord>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active_threshold(&self) -> u64 {
        self.active_threshold
    }

    pub fn history_window(&self) -> Duration {
        self.history_window
    }

    /// Copy of the record for `id`, if known.
    pub fn get(&self, id: ItemId) -> Option<ItemRecord> {
        self.read().get(&id).cloned()
    }

    /// Whether `id` is eligible for refresh cycles; `None` if unknown.
    pub fn eligibility(&self, id: ItemId) -> Option<bool> {
        self.read()
            .get(&id)
            .map(|record| record.is_eligible(self.active_threshold))
    }

    pub fn exists(&self, id: ItemId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert or replace the record for `id`.
    pub fn upsert(&self, id: ItemId, mut record: ItemRecord) {
        record.id = id;
        self.write().insert(id, record);
    }

    /// Insert `record` unless its id is already present.
    ///
    /// Returns `true` if the record was inserted.
    pub fn insert_if_absent(&self, record: ItemRecord) -> bool {
        let mut items = self.write();
        if items.contains_key(&record.id) {
            return false;
        }
        items.insert(record.id, record);
        true
    }

    /// Update only the population of a record that is not eligible for
    /// refresh cycles.
    ///
    /// Eligibility is re-checked under the write lock, so a record that
    /// became eligible (or was force-refreshed) since the caller looked at
    /// it is left to the refresh cycle. Returns `true` if written.
    pub fn update_dormant_population(&self, id: ItemId, population: u64) -> bool {
        let mut items = self.write();
        match items.get_mut(&id) {
            Some(record) if !record.is_eligible(self.active_threshold) => {
                record.population = population;
                true
            }
            _ => false,
        }
    }

    /// Flag `id` for inclusion in the next refresh cycle. Returns `false`
    /// for an unknown id.
    pub fn set_force_refresh(&self, id: ItemId) -> bool {
        match self.write().get_mut(&id) {
            Some(record) => {
                record.force_refresh = true;
                true
            }
            None => false,
        }
    }

    /// Collect every eligible item with its last known population and
    /// clear the force-refresh flags of the collected items.
    ///
    /// The returned map is detached from the store: callers may hold it
    /// across slow work without blocking readers.
    pub fn snapshot_eligible(&self) -> BTreeMap<ItemId, u64> {
        let mut items = self.write();
        let mut snapshot = BTreeMap::new();
        for (id, record) in items.iter_mut() {
            if record.is_eligible(self.active_threshold) {
                record.force_refresh = false;
                snapshot.insert(*id, record.population);
            }
        }
        snapshot
    }

    /// Apply one record's refresh. Returns `false` for an unknown id.
    pub fn apply_refresh(&self, id: ItemId, update: RefreshUpdate) -> bool {
        let mut items = self.write();
        match items.get_mut(&id) {
            Some(record) => {
                apply_to_record(record, &update, self.history_window);
                true
            }
            None => false,
        }
    }

    /// Apply a full refresh cycle under one exclusive section.
    ///
    /// Every id in `populations` gets its new population; when `total` is
    /// non-zero each also gets a market share sample, a re-derived price,
    /// a price sample, trimmed histories and fresh hi/lo.
    pub fn apply_cycle(
        &self,
        populations: &BTreeMap<ItemId, u64>,
        total: u64,
        now: DateTime<Utc>,
    ) -> CycleApplied {
        let mut applied = CycleApplied::default();
        let mut items = self.write();
        for (id, &population) in populations {
            let Some(record) = items.get_mut(id) else {
                continue;
            };
            let update = RefreshUpdate {
                population,
                market_share: pricing::market_share(population, total),
                at: now,
            };
            apply_to_record(record, &update, self.history_window);
            applied.updated += 1;
            if update.market_share.is_some() {
                applied.priced += 1;
            }
        }
        applied
    }

    /// Serialize the whole store as a JSON object keyed by item id.
    pub fn to_blob(&self) -> Result<Vec<u8>, StoreError> {
        let items = self.read();
        Ok(serde_json::to_vec(&*items)?)
    }

    /// Rebuild a store from a blob written by [`ItemStore::to_blob`].
    ///
    /// Record ids are taken from the map keys.
    pub fn from_blob(
        blob: &[u8],
        active_threshold: u64,
        history_window: Duration,
    ) -> Result<Self, StoreError> {
        let mut items: BTreeMap<ItemId, ItemRecord> = serde_json::from_slice(blob)?;
        for (id, record) in items.iter_mut() {
            record.id = *id;
        }
        Ok(Self::from_records(items, active_threshold, history_window))
    }

    /// Load the persisted store, or an empty one if nothing was saved yet.
    pub fn load(blobs: &dyn BlobStore, config: &EngineConfig) -> Result<Self, StoreError> {
        match blobs.load(STORE_BLOB_KEY)? {
            Some(blob) => {
                let store =
                    Self::from_blob(&blob, config.active_threshold, config.history_window)?;
                info!(items = store.len(), key = STORE_BLOB_KEY, "Item store loaded");
                Ok(store)
            }
            None => {
                info!(key = STORE_BLOB_KEY, "No persisted item store, starting empty");
                Ok(Self::with_config(config))
            }
        }
    }

    /// Persist the whole store. The read lock is held only while
    /// serializing, not while writing. Concurrent persists run one at a
    /// time; readers and writers of the records are not blocked.
    pub fn persist(&self, blobs: &dyn BlobStore) -> Result<usize, StoreError> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let blob = self.to_blob()?;
        blobs.save(STORE_BLOB_KEY, &blob)?;
        debug!(bytes = blob.len(), key = STORE_BLOB_KEY, "Item store persisted");
        Ok(blob.len())
    }
}

/// Apply a refresh to one record in place.
fn apply_to_record(record: &mut ItemRecord, update: &RefreshUpdate, window: Duration) {
    record.population = update.population;

    let Some(market_share) = update.market_share else {
        return;
    };

    let cutoff = update.at - window;

    pricing::evict_stale(&mut record.share_history, cutoff);
    record.share_history.push(ShareSample {
        market_share,
        at: update.at,
    });

    let Some(price) = pricing::derive_price(&record.share_history) else {
        unreachable!("share history holds the sample appended above");
    };
    record.price_delta = price - record.price;
    record.price = price;

    pricing::evict_stale(&mut record.price_history, cutoff);
    record.price_history.push(PriceSample {
        price,
        at: update.at,
    });

    let (hi, lo) = pricing::hi_lo(&record.price_history).unwrap_or((price, price));
    record.hi_24h = Some(hi);
    record.lo_24h = Some(lo);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use persistence::MemoryBlobStore;
    use types::numeric::Price;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn store() -> ItemStore {
        ItemStore::new(25, Duration::hours(24))
    }

    fn record(id: u32, name: &str, population: u64) -> ItemRecord {
        let mut r = ItemRecord::new(ItemId::new(id), name);
        r.population = population;
        r
    }

    #[test]
    fn test_insert_get_exists() {
        let store = store();
        assert!(store.is_empty());
        assert!(store.insert_if_absent(record(570, "Dota 2", 0)));
        assert!(!store.insert_if_absent(record(570, "Renamed", 5)));

        assert!(store.exists(ItemId::new(570)));
        assert!(!store.exists(ItemId::new(440)));
        assert_eq!(store.get(ItemId::new(570)).unwrap().name, "Dota 2");
        assert!(store.get(ItemId::new(440)).is_none());
    }

    #[test]
    fn test_upsert_normalizes_id() {
        let store = store();
        store.upsert(ItemId::new(730), record(1, "CS2", 10));
        assert_eq!(store.get(ItemId::new(730)).unwrap().id, ItemId::new(730));
        assert!(!store.exists(ItemId::new(1)));
    }

    #[test]
    fn test_snapshot_eligible_clears_force_flag() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "active", 100));
        store.upsert(ItemId::new(2), record(2, "dormant", 3));
        let mut forced = record(3, "forced", 0);
        forced.force_refresh = true;
        store.upsert(ItemId::new(3), forced);

        let snapshot = store.snapshot_eligible();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&ItemId::new(1)), Some(&100));
        assert_eq!(snapshot.get(&ItemId::new(3)), Some(&0));
        assert!(!store.get(ItemId::new(3)).unwrap().force_refresh);

        // A second snapshot no longer sees the forced item.
        let again = store.snapshot_eligible();
        assert_eq!(again.keys().copied().collect::<Vec<_>>(), vec![ItemId::new(1)]);
    }

    #[test]
    fn test_eligibility() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "active", 100));
        store.upsert(ItemId::new(2), record(2, "dormant", 25));

        assert_eq!(store.eligibility(ItemId::new(1)), Some(true));
        assert_eq!(store.eligibility(ItemId::new(2)), Some(false));
        assert_eq!(store.eligibility(ItemId::new(3)), None);

        assert!(store.set_force_refresh(ItemId::new(2)));
        assert_eq!(store.eligibility(ItemId::new(2)), Some(true));
    }

    #[test]
    fn test_update_dormant_population_skips_eligible() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "active", 100));
        store.upsert(ItemId::new(2), record(2, "dormant", 3));

        assert!(!store.update_dormant_population(ItemId::new(1), 7));
        assert_eq!(store.get(ItemId::new(1)).unwrap().population, 100);

        assert!(store.update_dormant_population(ItemId::new(2), 7));
        assert_eq!(store.get(ItemId::new(2)).unwrap().population, 7);

        assert!(!store.update_dormant_population(ItemId::new(99), 7));
    }

    #[test]
    fn test_apply_cycle_prices_records() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "a", 30));
        store.upsert(ItemId::new(2), record(2, "b", 90));

        let populations = BTreeMap::from([(ItemId::new(1), 25), (ItemId::new(2), 75)]);
        let applied = store.apply_cycle(&populations, 100, t0());
        assert_eq!(applied, CycleApplied { updated: 2, priced: 2 });

        let a = store.get(ItemId::new(1)).unwrap();
        assert_eq!(a.population, 25);
        assert_eq!(a.share_history.len(), 1);
        assert_eq!(a.share_history[0].market_share, dec("0.25"));
        assert_eq!(a.price, Price::from_cents(2_500_000));
        assert_eq!(a.price_delta.as_decimal(), dec("25000.00"));
        assert_eq!(a.hi_24h, Some(a.price));
        assert_eq!(a.lo_24h, Some(a.price));

        let b = store.get(ItemId::new(2)).unwrap();
        assert_eq!(b.price, Price::from_cents(7_500_000));
    }

    #[test]
    fn test_apply_cycle_zero_total_only_sets_population() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "a", 30));

        let populations = BTreeMap::from([(ItemId::new(1), 0)]);
        let applied = store.apply_cycle(&populations, 0, t0());
        assert_eq!(applied, CycleApplied { updated: 1, priced: 0 });

        let a = store.get(ItemId::new(1)).unwrap();
        assert_eq!(a.population, 0);
        assert!(a.share_history.is_empty());
        assert!(a.price_history.is_empty());
        assert!(a.hi_24h.is_none());
    }

    #[test]
    fn test_apply_refresh_windows_history_and_hi_lo() {
        let store = store();
        let id = ItemId::new(1);
        store.upsert(id, record(1, "a", 30));
        let now = t0();

        // The first sample sets the 24h high and falls out of the window
        // exactly when the next new high arrives.
        let updates = [
            (now - Duration::minutes(24 * 60 + 30), "0.50"),
            (now - Duration::hours(1), "0.10"),
        ];
        for (at, share) in updates {
            assert!(store.apply_refresh(
                id,
                RefreshUpdate {
                    population: 30,
                    market_share: Some(dec(share)),
                    at,
                }
            ));
        }
        let before = store.get(id).unwrap();
        assert_eq!(before.hi_24h, Some(Price::from_cents(5_000_000)));
        assert_eq!(before.lo_24h, Some(Price::from_cents(3_000_000)));

        store.apply_refresh(
            id,
            RefreshUpdate {
                population: 95,
                market_share: Some(dec("0.95")),
                at: now,
            },
        );

        let r = store.get(id).unwrap();
        assert_eq!(r.share_history.len(), 2);
        assert!(r.share_history.iter().all(|s| s.at > now - Duration::hours(24)));
        assert!(r.share_history.windows(2).all(|w| w[0].at <= w[1].at));

        // mean(0.10, 0.95) = 0.525 -> 52500.00
        assert_eq!(r.price, Price::from_cents(5_250_000));
        assert_eq!(r.price_delta.as_decimal(), dec("22500.00"));
        assert_eq!(r.price_history.len(), 2);

        let prices: Vec<Price> = r.price_history.iter().map(|s| s.price).collect();
        assert_eq!(r.hi_24h, prices.iter().copied().max());
        assert_eq!(r.lo_24h, prices.iter().copied().min());
        assert_eq!(r.hi_24h, Some(Price::from_cents(5_250_000)));
        assert_eq!(r.lo_24h, Some(Price::from_cents(3_000_000)));
    }

    #[test]
    fn test_apply_refresh_unknown_id() {
        let store = store();
        assert!(!store.apply_refresh(
            ItemId::new(5),
            RefreshUpdate {
                population: 1,
                market_share: None,
                at: t0(),
            }
        ));
    }

    #[test]
    fn test_blob_roundtrip_normalizes_ids() {
        let store = store();
        store.upsert(ItemId::new(1), record(1, "a", 30));
        let populations = BTreeMap::from([(ItemId::new(1), 30)]);
        store.apply_cycle(&populations, 60, t0());

        let blob = store.to_blob().unwrap();
        let back = ItemStore::from_blob(&blob, 25, Duration::hours(24)).unwrap();
        assert_eq!(back.get(ItemId::new(1)), store.get(ItemId::new(1)));

        let tampered = br#"{"570":{"id":0,"name":"Dota 2","population":5}}"#;
        let loaded = ItemStore::from_blob(tampered, 25, Duration::hours(24)).unwrap();
        assert_eq!(loaded.get(ItemId::new(570)).unwrap().id, ItemId::new(570));
    }

    #[test]
    fn test_load_and_persist() {
        let blobs = MemoryBlobStore::new();
        let config = EngineConfig::default();

        let empty = ItemStore::load(&blobs, &config).unwrap();
        assert!(empty.is_empty());

        empty.upsert(ItemId::new(10), record(10, "Counter-Strike", 12));
        empty.persist(&blobs).unwrap();

        let loaded = ItemStore::load(&blobs, &config).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(ItemId::new(10)).unwrap().population, 12);
    }

    #[test]
    fn test_load_corrupt_blob_is_error() {
        let blobs = MemoryBlobStore::new();
        blobs.save(STORE_BLOB_KEY, b"not json").unwrap();
        let result = ItemStore::load(&blobs, &EngineConfig::default());
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
