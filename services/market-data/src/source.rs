//! Upstream data sources
//!
//! The engine depends on two external services: a catalog listing
//! (`(id, name)` for every item) and a per-item population count. Both
//! sit behind traits so the loops can be driven by in-process fakes in
//! tests; the HTTP implementations speak the Steam Web API shapes.
//!
//! ## API Reference
//!
//! Catalog: `GET {catalog_url}` returns `{"applist":{"apps":[{"appid":..,"name":..}]}}`
//! Population: `GET {population_url}?appid={id}&key={key}` returns
//! `{"response":{"player_count":..,"result":1}}`

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use types::errors::SourceError;
use types::ids::ItemId;
use types::item::CatalogEntry;

use crate::config::EngineConfig;

/// Lists the full upstream catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError>;
}

/// Reports the current population of one item.
#[async_trait]
pub trait PopulationSource: Send + Sync {
    async fn query_population(&self, id: ItemId) -> Result<u64, SourceError>;
}

#[derive(Debug, Deserialize)]
struct AppListResponse {
    applist: AppList,
}

#[derive(Debug, Deserialize)]
struct AppList {
    apps: Vec<AppInfo>,
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    appid: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlayerCountResponse {
    response: PlayerCount,
}

#[derive(Debug, Deserialize)]
struct PlayerCount {
    #[serde(default)]
    player_count: Option<u64>,
}

fn transport(e: reqwest::Error) -> SourceError {
    SourceError::Transport(e.to_string())
}

fn build_client(config: &EngineConfig) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(transport)
}

async fn get_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, SourceError> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().path().to_string(),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::Decode(e.to_string()))
}

/// Catalog listing over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(config: &EngineConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config)?,
            url: config.catalog_url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError> {
        let parsed: AppListResponse = get_json(self.client.get(&self.url)).await?;
        debug!(apps = parsed.applist.apps.len(), "Catalog fetched");
        Ok(parse_catalog(parsed))
    }
}

fn parse_catalog(parsed: AppListResponse) -> Vec<CatalogEntry> {
    parsed
        .applist
        .apps
        .into_iter()
        .map(|app| CatalogEntry::new(app.appid, app.name))
        .collect()
}

/// Population counts over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPopulationSource {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpPopulationSource {
    pub fn new(config: &EngineConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config)?,
            url: config.population_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PopulationSource for HttpPopulationSource {
    async fn query_population(&self, id: ItemId) -> Result<u64, SourceError> {
        let mut query = vec![("appid", id.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        let parsed: PlayerCountResponse =
            get_json(self.client.get(&self.url).query(&query)).await?;
        Ok(parse_player_count(id, parsed))
    }
}

/// Items the upstream has no count for (`result` other than 1, no
/// `player_count`) report zero players.
fn parse_player_count(id: ItemId, parsed: PlayerCountResponse) -> u64 {
    parsed.response.player_count.unwrap_or_else(|| {
        debug!(item = %id, "No player count reported, treating as zero");
        0
    })
}
