//! Live map server.
//!
//! Every request to `/` or `/api/flights` runs a fresh scan, so the page's
//! refresh control is simply a reload. Scans run one at a time; a request
//! that arrives during a scan waits for it to finish and then runs its own.
//! The catalog is the only state kept between requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};

use crate::catalog::{Catalog, CatalogSource};
use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, Scan};
use crate::present::{render_map, MapOptions};
use crate::rarity::{EnrichedFlight, Tier};

/// Page settings that don't change between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    /// Page title.
    pub title: String,
    /// Challenge texts shown in the side panel.
    pub challenges: Vec<String>,
    /// Tile layer URL template.
    pub tile_url: String,
    /// Tile layer attribution.
    pub tile_attribution: String,
}

impl PageSettings {
    /// Build page settings from the map configuration.
    #[must_use]
    pub fn new(map: &MapConfig, challenges: Vec<String>) -> Self {
        Self {
            title: "Rare Planes Live".to_string(),
            challenges,
            tile_url: map.tile_url.clone(),
            tile_attribution: map.tile_attribution.clone(),
        }
    }
}

/// Shared state behind every request.
pub struct AppState {
    pipeline: Pipeline,
    catalog_source: Arc<dyn CatalogSource>,
    catalog: RwLock<Option<Arc<Catalog>>>,
    scan_gate: Mutex<()>,
    page: PageSettings,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create server state. The catalog is loaded on first use.
    #[must_use]
    pub fn new(
        pipeline: Pipeline,
        catalog_source: Arc<dyn CatalogSource>,
        page: PageSettings,
    ) -> Self {
        Self {
            pipeline,
            catalog_source,
            catalog: RwLock::new(None),
            scan_gate: Mutex::new(()),
            page,
        }
    }

    /// Load the catalog now instead of on the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded. Requests will retry.
    pub async fn preload(&self) -> Result<()> {
        self.catalog().await.map(|_| ())
    }

    async fn catalog(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.catalog.read().await.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut slot = self.catalog.write().await;
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(self.catalog_source.load_catalog().await?);
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    async fn scan(&self) -> Result<Scan> {
        let catalog = self.catalog().await?;
        let _gate = self.scan_gate.lock().await;
        Ok(self.pipeline.run(&catalog).await)
    }
}

/// An error that ends a request.
#[derive(Debug)]
struct ServerError(Error);

impl From<Error> for ServerError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = if self.0.is_remote() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error!(error = %self.0, status = status.as_u16(), "Request failed");
        (status, self.0.to_string()).into_response()
    }
}

/// One flight in the JSON API.
#[derive(Debug, Serialize)]
struct FlightView<'a> {
    flight_id: &'a str,
    callsign: &'a str,
    type_code: &'a str,
    name: &'a str,
    registration: &'a str,
    rarity: f64,
    tier: Tier,
    xp: u64,
    lat: f64,
    lon: f64,
    altitude: i64,
    ground_speed: i64,
    route: Option<String>,
}

impl<'a> From<&'a EnrichedFlight> for FlightView<'a> {
    fn from(entry: &'a EnrichedFlight) -> Self {
        Self {
            flight_id: &entry.flight.flight_id,
            callsign: &entry.flight.callsign,
            type_code: &entry.aircraft.type_code,
            name: &entry.aircraft.name,
            registration: &entry.flight.registration,
            rarity: entry.rarity_score(),
            tier: entry.tier,
            xp: entry.aircraft.xp,
            lat: entry.flight.position.lat,
            lon: entry.flight.position.lon,
            altitude: entry.flight.altitude,
            ground_speed: entry.flight.ground_speed,
            route: entry.flight.route(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FlightsResponse<'a> {
    count: usize,
    min_rarity: f64,
    scanned_at: DateTime<Utc>,
    flights: Vec<FlightView<'a>>,
    regions_failed: usize,
    regions_truncated: usize,
}

/// Build the router for the live server.
pub fn router(state: Arc<AppState>, timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/flights", get(flights))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

async fn index(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Html<String>, ServerError> {
    let scan = state.scan().await?;
    let options = MapOptions {
        title: &state.page.title,
        min_rarity: scan.min_rarity,
        challenges: &state.page.challenges,
        tile_url: &state.page.tile_url,
        tile_attribution: &state.page.tile_attribution,
        live: true,
        generated_at: scan.scanned_at,
    };
    Ok(Html(render_map(&scan.matches, &options)?))
}

async fn flights(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Response, ServerError> {
    let scan = state.scan().await?;
    let body = FlightsResponse {
        count: scan.matches.len(),
        min_rarity: scan.min_rarity,
        scanned_at: scan.scanned_at,
        flights: scan.matches.iter().map(FlightView::from).collect(),
        regions_failed: scan.regions_failed.len(),
        regions_truncated: scan.regions_truncated.len(),
    };
    Ok(Json(body).into_response())
}

async fn health() -> &'static str {
    "ok"
}

/// Serve on `addr` until ctrl-c.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>, timeout: Duration) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::ServerBind {
            addr: addr.to_string(),
            source,
        })?;
    serve_on(listener, state, timeout, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    timeout: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Starting live server");
    }
    axum::serve(listener, router(state, timeout))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Live server has been shut down");
    Ok(())
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Starting graceful shutdown");
}
