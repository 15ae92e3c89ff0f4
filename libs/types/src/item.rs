//! Catalog item records and their windowed histories
//!
//! An `ItemRecord` is the system of record for one catalog item: its last
//! observed population, its derived price, and the trailing 24-hour share
//! and price histories the price is computed from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::numeric::{Price, PriceDelta};

/// One market-share observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSample {
    /// Fraction of the aggregate population in [0, 1].
    pub market_share: Decimal,
    pub at: DateTime<Utc>,
}

/// One derived-price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: Price,
    pub at: DateTime<Utc>,
}

/// A timestamped sample that can be trimmed to a trailing window.
pub trait Timestamped {
    fn at(&self) -> DateTime<Utc>;
}

impl Timestamped for ShareSample {
    fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl Timestamped for PriceSample {
    fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// An `(id, name)` pair as listed by the upstream catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: ItemId,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Current state of one catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    /// Last observed population.
    pub population: u64,
    /// Set by a user request, cleared when a refresh cycle picks the item up.
    #[serde(default)]
    pub force_refresh: bool,
    /// Cached result of price derivation over `share_history`.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub price_delta: PriceDelta,
    #[serde(default)]
    pub share_history: Vec<ShareSample>,
    #[serde(default)]
    pub price_history: Vec<PriceSample>,
    /// Absent only until the first refresh cycle.
    #[serde(default)]
    pub hi_24h: Option<Price>,
    #[serde(default)]
    pub lo_24h: Option<Price>,
}

impl ItemRecord {
    /// A freshly discovered item: zero population, no history.
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            population: 0,
            force_refresh: false,
            price: Price::ZERO,
            price_delta: PriceDelta::default(),
            share_history: Vec::new(),
            price_history: Vec::new(),
            hi_24h: None,
            lo_24h: None,
        }
    }

    /// Whether the item takes part in refresh cycles: an active listing
    /// (population above `threshold`) or a pending forced refresh.
    pub fn is_eligible(&self, threshold: u64) -> bool {
        self.population > threshold || self.force_refresh
    }

    /// Whether the item has been through at least one refresh cycle.
    pub fn has_been_priced(&self) -> bool {
        !self.price_history.is_empty()
    }
}
