//! Persistence Service
//!
//! Opaque key-value blob storage used by the market data engine. The engine
//! treats its whole item store as one blob under a fixed key; per-user
//! holdings live under `players/<user>` and are owned by the ledger.
//!
//! Writes are atomic: a blob is either the previous version or the new one,
//! never a torn mix of both.

pub mod blob;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore, PersistenceError};
