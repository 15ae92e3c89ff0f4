//! Engine configuration
//!
//! Defaults match the production deployment; every field can be overridden
//! from the environment (see [`EngineConfig::from_env`]).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use types::numeric::Price;

/// Key under which the whole item store is persisted.
pub const STORE_BLOB_KEY: &str = "app_data.json";

/// Configuration for the market data engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Items with more than this many players are active listings.
    pub active_threshold: u64,
    /// Items priced at or below this are left out of the public listing.
    pub tradeable_floor: Price,
    /// Trailing window kept in share and price histories.
    pub history_window: chrono::Duration,
    /// Pause between successive outbound population queries.
    pub query_pause: Duration,
    /// Pause after a failed outbound query.
    pub error_pause: Duration,
    /// Directory holding persisted blobs.
    pub save_dir: PathBuf,
    /// Catalog listing endpoint.
    pub catalog_url: String,
    /// Population count endpoint (item id is passed as `appid`).
    pub population_url: String,
    /// API key sent with population queries, if the upstream wants one.
    pub api_key: Option<String>,
    /// Transport timeout for upstream requests.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_threshold: 25,
            tradeable_floor: Price::from_cents(100),
            history_window: chrono::Duration::hours(24),
            query_pause: Duration::from_millis(100),
            error_pause: Duration::from_secs(5),
            save_dir: PathBuf::from("save"),
            catalog_url: "https://api.steampowered.com/ISteamApps/GetAppList/v2/".to_string(),
            population_url:
                "https://api.steampowered.com/ISteamUserStats/GetNumberOfCurrentPlayers/v1/"
                    .to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (unset or unparsable values keep the default):
    /// - `MARKET_ACTIVE_THRESHOLD` (default: 25)
    /// - `MARKET_TRADEABLE_FLOOR_CENTS` (default: 100)
    /// - `MARKET_HISTORY_WINDOW_HOURS` (default: 24)
    /// - `MARKET_QUERY_PAUSE_MS` (default: 100)
    /// - `MARKET_ERROR_PAUSE_MS` (default: 5000)
    /// - `MARKET_SAVE_DIR` (default: save)
    /// - `MARKET_CATALOG_URL`, `MARKET_POPULATION_URL`
    /// - `MARKET_API_KEY` (default: none)
    /// - `MARKET_REQUEST_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            active_threshold: parse_var("MARKET_ACTIVE_THRESHOLD")
                .unwrap_or(defaults.active_threshold),
            tradeable_floor: parse_var("MARKET_TRADEABLE_FLOOR_CENTS")
                .map(Price::from_cents)
                .unwrap_or(defaults.tradeable_floor),
            history_window: parse_var("MARKET_HISTORY_WINDOW_HOURS")
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.history_window),
            query_pause: parse_var("MARKET_QUERY_PAUSE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_pause),
            error_pause: parse_var("MARKET_ERROR_PAUSE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.error_pause),
            save_dir: env::var("MARKET_SAVE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.save_dir),
            catalog_url: env::var("MARKET_CATALOG_URL").unwrap_or(defaults.catalog_url),
            population_url: env::var("MARKET_POPULATION_URL")
                .unwrap_or(defaults.population_url),
            api_key: env::var("MARKET_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .or(defaults.api_key),
            request_timeout: parse_var("MARKET_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
