//! Market Data Engine
//!
//! Prices a catalog of items (games) from their share of the aggregate
//! live population:
//! - Discovery of new catalog items and dormant population tracking
//! - Refresh cycles that re-price every eligible item
//! - 24h share and price histories with rolling hi/lo
//! - Ranked listing, fuzzy name lookup and on-demand refresh for readers
//! - Whole-store persistence after every cycle
//!
//! # Architecture
//!
//! ```text
//!  Catalog API          Population API
//!       │                 │        │
//!  ┌────▼──────┐          │   ┌────▼────┐
//!  │ Discovery │◀─────────┘   │ Refresh │──▶ CycleMetrics
//!  └────┬──────┘              └──┬───┬──┘
//!       │ insert / dormant       │   │ persist
//!       │ population    snapshot │   ▼
//!  ┌────▼────────────────────────▼┐ BlobStore
//!  │          ItemStore           │
//!  │   RwLock<BTreeMap<Id, Rec>>  │
//!  └──────────────┬───────────────┘
//!                 │
//!        ranked / fetch / fuzzy / request_refresh
//! ```

pub mod config;
pub mod discovery;
pub mod engine;
pub mod metrics;
pub mod pricing;
pub mod query;
pub mod refresh;
pub mod source;
pub mod store;

pub use config::EngineConfig;
pub use engine::{EngineError, EngineHandles, MarketDataEngine};
pub use store::ItemStore;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
