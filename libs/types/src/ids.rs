//! Identifier types for catalog items
//!
//! Items are keyed by the upstream catalog's numeric identifier. The id is
//! assigned once at discovery and never changes; its natural ordering is
//! what the query surface uses to break ties deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Unique identifier for a catalog item
///
/// Mirrors the upstream catalog id. Serializes as a bare integer so the
/// persisted store reads the same as the upstream listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u32);

impl ItemId {
    /// Create from a raw upstream id
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw upstream id
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u32> for ItemId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
