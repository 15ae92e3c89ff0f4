//! Types library for the population-share market
//!
//! Core type definitions used by the market data engine.
//!
//! # Modules
//! - `ids`: Item identifiers
//! - `numeric`: Fixed-point cent prices and cash formatting
//! - `item`: Item records, share/price samples, catalog entries
//! - `errors`: Error taxonomy for upstream sources

// Public modules
pub mod ids;
pub mod numeric;
pub mod item;
pub mod errors;
