//! Aircraft rarity catalog.
//!
//! The catalog maps ICAO type codes to a rarity score. It is fetched once
//! per run from the remote models API and is read-only afterwards.

use std::collections::{HashMap, HashSet};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::http::{build_client, check_status};

/// Name used for this source in errors and logs.
const SOURCE_NAME: &str = "rarity catalog";

/// The remote API stores rareness on a 0-2000 scale; scores are shown /100.
const RARENESS_SCALE: f64 = 100.0;

/// One aircraft type with its rarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftType {
    /// ICAO type designator.
    pub type_code: String,
    /// Full aircraft name, e.g. "Airbus A380-800".
    pub name: String,
    /// Rarity on the display scale (e.g. 8.95).
    pub rarity_score: f64,
    /// Experience points awarded for spotting this type.
    pub xp: u64,
    /// Card category as reported by the catalog ("common", "ultra", ...).
    pub category: String,
}

impl AircraftType {
    /// Create a type with the given score and no extra metadata.
    #[must_use]
    pub fn new(type_code: impl Into<String>, rarity_score: f64) -> Self {
        let type_code = type_code.into();
        Self {
            name: type_code.clone(),
            type_code,
            rarity_score,
            xp: 0,
            category: String::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// All known aircraft types keyed by type code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    types: HashMap<String, AircraftType>,
}

impl Catalog {
    /// Build a catalog from a list of types. Later duplicates replace earlier ones.
    #[must_use]
    pub fn from_types(types: impl IntoIterator<Item = AircraftType>) -> Self {
        Self {
            types: types
                .into_iter()
                .map(|t| (t.type_code.clone(), t))
                .collect(),
        }
    }

    /// Parse the body returned by the models API.
    ///
    /// Blacklisted and id-less rows are skipped; rows that fail to decode are
    /// dropped with a debug log.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object with a `rows` list.
    pub fn from_models_json(body: &str) -> Result<Self> {
        let response: ModelsResponse =
            serde_json::from_str(body).map_err(|e| Error::decode(SOURCE_NAME, e.to_string()))?;

        let blacklist: HashSet<String> = response.blacklist.into_iter().collect();
        let mut types = HashMap::with_capacity(response.rows.len());
        let mut dropped = 0_usize;

        for raw in response.rows {
            let row: ModelRow = match serde_json::from_value(raw) {
                Ok(row) => row,
                Err(e) => {
                    debug!(error = %e, "Dropping malformed catalog row");
                    dropped += 1;
                    continue;
                }
            };
            if row.id.is_empty() || blacklist.contains(&row.id) {
                continue;
            }
            let aircraft = row.into_aircraft_type();
            types.insert(aircraft.type_code.clone(), aircraft);
        }

        if dropped > 0 {
            debug!(dropped, "Some catalog rows could not be decoded");
        }
        Ok(Self { types })
    }

    /// Look up a type code.
    #[must_use]
    pub fn get(&self, type_code: &str) -> Option<&AircraftType> {
        self.types.get(type_code)
    }

    /// Number of types in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    rows: Vec<serde_json::Value>,
    #[serde(default)]
    blacklist: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rareness: f64,
    #[serde(default)]
    card_category: Option<String>,
    #[serde(default)]
    xp: u64,
}

impl ModelRow {
    fn into_aircraft_type(self) -> AircraftType {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.clone());
        AircraftType {
            type_code: self.id,
            name,
            rarity_score: self.rareness / RARENESS_SCALE,
            xp: self.xp,
            category: self.card_category.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Something that can produce the rarity catalog.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch and parse the full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreachable or the body is unusable.
    async fn load_catalog(&self) -> Result<Catalog>;
}

/// Loads the catalog from the remote models API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    url: String,
    client_version: String,
}

impl CatalogClient {
    /// Create a client from the API configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(api)?,
            url: api.catalog_url.clone(),
            client_version: api.client_version.clone(),
        })
    }
}

#[async_trait::async_trait]
impl CatalogSource for CatalogClient {
    async fn load_catalog(&self) -> Result<Catalog> {
        debug!(url = %self.url, "Fetching rarity catalog");
        let response = self
            .client
            .get(&self.url)
            .query(&[("updatedAt", "0")])
            .header("X-Client-Version", &self.client_version)
            .send()
            .await
            .map_err(|e| Error::http(&self.url, e))?;

        let body = check_status(&self.url, response)?
            .text()
            .await
            .map_err(|e| Error::http(&self.url, e))?;

        let catalog = Catalog::from_models_json(&body)?;
        info!(types = catalog.len(), "Loaded rarity catalog");
        Ok(catalog)
    }
}
