//! Live flight fetching.
//!
//! Flights are fetched one region at a time from a [`FlightSource`]. The
//! [`Fetcher`] runs region fetches on a bounded pool of tokio tasks, skips
//! regions that fail, and merges the rest into one deduplicated list.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::flight::{BoundingBox, FlightRecord, Position};
use crate::http::{build_client, check_status};

/// Name used for the feed in errors and logs.
const SOURCE_NAME: &str = "flight feed";

/// Most flights the feed returns for one request.
pub const REGION_LIMIT: usize = 1500;

/// Fixed query flags sent with every feed request.
const FEED_FLAGS: [(&str, &str); 12] = [
    ("faa", "1"),
    ("satellite", "1"),
    ("mlat", "1"),
    ("flarm", "1"),
    ("adsb", "1"),
    ("gnd", "0"),
    ("air", "1"),
    ("vehicles", "0"),
    ("estimated", "1"),
    ("maxage", "14400"),
    ("gliders", "1"),
    ("stats", "0"),
];

/// Positions of the fields we use within a feed entry array.
mod field {
    pub const LAT: usize = 1;
    pub const LON: usize = 2;
    pub const TRACK: usize = 3;
    pub const ALTITUDE: usize = 4;
    pub const SPEED: usize = 5;
    pub const TYPE_CODE: usize = 8;
    pub const REGISTRATION: usize = 9;
    pub const ORIGIN: usize = 11;
    pub const DESTINATION: usize = 12;
    pub const CALLSIGN: usize = 16;
}

/// A provider of live flights for one region at a time.
#[async_trait::async_trait]
pub trait FlightSource: Send + Sync {
    /// The name of this source (for logging).
    fn name(&self) -> &'static str;

    /// Most flights one region fetch can return, if the source caps it.
    fn region_limit(&self) -> Option<usize> {
        None
    }

    /// Fetch all flights currently inside `region`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region could not be fetched.
    async fn fetch_region(&self, region: &BoundingBox) -> Result<Vec<FlightRecord>>;
}

/// A region that could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    /// The region that was skipped.
    pub region: BoundingBox,
    /// Why it failed.
    pub message: String,
}

/// The merged result of fetching a set of regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Unique flights across all successful regions.
    pub flights: Vec<FlightRecord>,
    /// Number of regions requested.
    pub regions_total: usize,
    /// Regions that were skipped because their fetch failed.
    pub regions_failed: Vec<RegionFailure>,
    /// Regions that hit the source's per-request limit and may be missing flights.
    pub regions_truncated: Vec<BoundingBox>,
}

/// Fetches many regions concurrently from one source.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn FlightSource>,
    concurrency: usize,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("source", &self.source.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Fetcher {
    /// Create a fetcher with at most `concurrency` requests in flight.
    #[must_use]
    pub fn new(source: Arc<dyn FlightSource>, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch every region and merge the results.
    ///
    /// A failing region is logged and recorded in the snapshot; it never
    /// aborts the others. A region that returns as many flights as the
    /// source's limit is recorded as truncated. Flights reported outside the
    /// region they were fetched for are dropped; the region that holds them
    /// returns them too. Each task owns its own result and the merge happens
    /// after all tasks finish, in region order, keeping the first record seen
    /// for each flight id.
    pub async fn fetch(&self, regions: &[BoundingBox]) -> FeedSnapshot {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, region) in regions.iter().copied().enumerate() {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (index, Err(Error::internal("fetch pool closed")));
                };
                (index, source.fetch_region(&region).await)
            });
        }

        let mut slots: Vec<Option<Result<Vec<FlightRecord>>>> =
            regions.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "Region fetch task did not complete"),
            }
        }

        let limit = self.source.region_limit();
        let mut flights = Vec::new();
        let mut regions_failed = Vec::new();
        let mut regions_truncated = Vec::new();
        for (region, slot) in regions.iter().zip(slots) {
            match slot {
                Some(Ok(mut batch)) => {
                    debug!(%region, count = batch.len(), "Fetched region");
                    if limit.is_some_and(|limit| batch.len() >= limit) {
                        warn!(
                            %region,
                            count = batch.len(),
                            "Region hit the feed limit, some flights may be missing"
                        );
                        regions_truncated.push(*region);
                    }
                    let before = batch.len();
                    batch.retain(|f| f.position.is_unknown() || region.contains(f.position));
                    if batch.len() < before {
                        debug!(
                            %region,
                            dropped = before - batch.len(),
                            "Dropped flights outside region"
                        );
                    }
                    flights.extend(batch);
                }
                Some(Err(e)) => {
                    warn!(%region, error = %e, "Skipping region");
                    regions_failed.push(RegionFailure {
                        region: *region,
                        message: e.to_string(),
                    });
                }
                None => regions_failed.push(RegionFailure {
                    region: *region,
                    message: "fetch task did not complete".to_string(),
                }),
            }
        }

        let flights = dedup_by_flight_id(flights);
        info!(
            source = self.source.name(),
            flights = flights.len(),
            regions = regions.len(),
            failed = regions_failed.len(),
            truncated = regions_truncated.len(),
            "Fetched live flights"
        );

        FeedSnapshot {
            flights,
            regions_total: regions.len(),
            regions_failed,
            regions_truncated,
        }
    }
}

/// Drop records whose flight id was already seen, keeping the first.
#[must_use]
pub fn dedup_by_flight_id(flights: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut seen = HashSet::with_capacity(flights.len());
    flights
        .into_iter()
        .filter(|f| seen.insert(f.flight_id.clone()))
        .collect()
}

/// Live flights from the public flight tracker feed.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    /// Create a feed client from the API configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(api)?,
            url: api.feed_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl FlightSource for HttpFeed {
    fn name(&self) -> &'static str {
        "flight-tracker-feed"
    }

    fn region_limit(&self) -> Option<usize> {
        Some(REGION_LIMIT)
    }

    async fn fetch_region(&self, region: &BoundingBox) -> Result<Vec<FlightRecord>> {
        // The feed wants north,south,west,east
        let bounds = format!(
            "{:.3},{:.3},{:.3},{:.3}",
            region.north, region.south, region.west, region.east
        );

        let limit = REGION_LIMIT.to_string();

        let response = self
            .client
            .get(&self.url)
            .query(&[("bounds", bounds.as_str()), ("limit", limit.as_str())])
            .query(&FEED_FLAGS[..])
            .send()
            .await
            .map_err(|e| Error::http(&self.url, e))?;

        let body: Value = check_status(&self.url, response)?
            .json()
            .await
            .map_err(|e| Error::decode(SOURCE_NAME, e.to_string()))?;

        decode_feed(&body)
    }
}

/// Decode a feed response body into flight records.
///
/// Flights are the array-valued entries of the top-level object, keyed by
/// flight id. Metadata entries (`full_count`, `version`, `stats`) are
/// ignored and malformed entries are dropped.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object.
pub fn decode_feed(body: &Value) -> Result<Vec<FlightRecord>> {
    let entries = body
        .as_object()
        .ok_or_else(|| Error::decode(SOURCE_NAME, "expected a JSON object"))?;

    let mut flights = Vec::with_capacity(entries.len());
    for (flight_id, entry) in entries {
        let Some(fields) = entry.as_array() else {
            continue;
        };
        match decode_entry(flight_id, fields) {
            Some(flight) => flights.push(flight),
            None => debug!(%flight_id, "Dropping malformed feed entry"),
        }
    }
    Ok(flights)
}

fn decode_entry(flight_id: &str, fields: &[Value]) -> Option<FlightRecord> {
    if fields.len() <= field::CALLSIGN {
        return None;
    }

    let lat = fields[field::LAT].as_f64()?;
    let lon = fields[field::LON].as_f64()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    Some(FlightRecord {
        flight_id: flight_id.to_string(),
        type_code: text(&fields[field::TYPE_CODE]).unwrap_or_default(),
        callsign: text(&fields[field::CALLSIGN]).unwrap_or_default(),
        registration: text(&fields[field::REGISTRATION]).unwrap_or_default(),
        position: Position::new(lat, lon),
        altitude: fields[field::ALTITUDE].as_i64().unwrap_or(0),
        ground_speed: fields[field::SPEED].as_i64().unwrap_or(0),
        track: fields[field::TRACK].as_i64().unwrap_or(0),
        origin: text(&fields[field::ORIGIN]),
        destination: text(&fields[field::DESTINATION]),
    })
}

/// A trimmed, non-empty string field.
fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::flight::world_regions;
    use crate::http::stub::StubServer;

    /// Serves canned flights per region; regions without an entry fail.
    struct StaticSource {
        by_region: HashMap<String, Vec<FlightRecord>>,
        delay: Duration,
        limit: Option<usize>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StaticSource {
        fn new() -> Self {
            Self {
                by_region: HashMap::new(),
                delay: Duration::ZERO,
                limit: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_region(mut self, region: BoundingBox, flights: Vec<FlightRecord>) -> Self {
            self.by_region.insert(region.to_string(), flights);
            self
        }
    }

    #[async_trait::async_trait]
    impl FlightSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        fn region_limit(&self) -> Option<usize> {
            self.limit
        }

        async fn fetch_region(&self, region: &BoundingBox) -> Result<Vec<FlightRecord>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.by_region
                .get(&region.to_string())
                .cloned()
                .ok_or_else(|| Error::HttpStatus {
                    url: format!("static://{region}"),
                    status: 500,
                })
        }
    }

    fn region(south: f64, north: f64) -> BoundingBox {
        BoundingBox::new(south, north, -10.0, 10.0).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_merges_regions() {
        let a = region(0.0, 10.0);
        let b = region(10.0, 20.0);
        let source = StaticSource::new()
            .with_region(a, vec![FlightRecord::new("1", "A388")])
            .with_region(b, vec![FlightRecord::new("2", "B744")]);
        let fetcher = Fetcher::new(Arc::new(source), 4);

        let snapshot = fetcher.fetch(&[a, b]).await;
        let ids: Vec<&str> = snapshot.flights.iter().map(|f| f.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(snapshot.regions_total, 2);
        assert!(snapshot.regions_failed.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_dedups_overlapping_regions() {
        let a = region(0.0, 10.0);
        let b = region(10.0, 20.0);
        let on_edge = FlightRecord::new("edge", "A388").with_callsign("EDGE1");
        let source = StaticSource::new()
            .with_region(a, vec![on_edge.clone()])
            .with_region(b, vec![on_edge, FlightRecord::new("3", "C172")]);
        let fetcher = Fetcher::new(Arc::new(source), 2);

        let snapshot = fetcher.fetch(&[a, b]).await;
        assert_eq!(snapshot.flights.len(), 2);
        assert_eq!(
            snapshot.flights.iter().filter(|f| f.flight_id == "edge").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_region_is_skipped() {
        crate::logging::init_test_logging();
        let good = region(0.0, 10.0);
        let bad = region(10.0, 20.0);
        let source =
            StaticSource::new().with_region(good, vec![FlightRecord::new("1", "A388")]);
        let fetcher = Fetcher::new(Arc::new(source), 2);

        let snapshot = fetcher.fetch(&[bad, good]).await;
        assert_eq!(snapshot.flights.len(), 1);
        assert_eq!(snapshot.flights[0].flight_id, "1");
        assert_eq!(snapshot.regions_failed.len(), 1);
        assert_eq!(snapshot.regions_failed[0].region, bad);
        assert!(snapshot.regions_failed[0].message.contains("500"));
    }

    #[tokio::test]
    async fn test_all_regions_failed() {
        let fetcher = Fetcher::new(Arc::new(StaticSource::new()), 2);
        let snapshot = fetcher.fetch(&[region(0.0, 10.0)]).await;
        assert!(snapshot.flights.is_empty());
        assert_eq!(snapshot.regions_failed.len(), snapshot.regions_total);
    }

    #[tokio::test]
    async fn test_region_at_limit_is_reported() {
        crate::logging::init_test_logging();
        let busy = region(0.0, 10.0);
        let quiet = region(10.0, 20.0);
        let mut source = StaticSource::new()
            .with_region(
                busy,
                (0..3).map(|i| FlightRecord::new(i.to_string(), "A320")).collect(),
            )
            .with_region(quiet, vec![FlightRecord::new("q", "A320")]);
        source.limit = Some(3);
        let fetcher = Fetcher::new(Arc::new(source), 2);

        let snapshot = fetcher.fetch(&[busy, quiet]).await;
        assert_eq!(snapshot.regions_truncated, vec![busy]);
        assert_eq!(snapshot.flights.len(), 4);
        assert!(snapshot.regions_failed.is_empty());
    }

    #[tokio::test]
    async fn test_unlimited_source_never_truncates() {
        let a = region(0.0, 10.0);
        let source = StaticSource::new().with_region(
            a,
            (0..2000).map(|i| FlightRecord::new(i.to_string(), "A320")).collect(),
        );
        let snapshot = Fetcher::new(Arc::new(source), 1).fetch(&[a]).await;
        assert!(snapshot.regions_truncated.is_empty());
    }

    #[tokio::test]
    async fn test_flights_outside_region_are_dropped() {
        let a = region(0.0, 10.0);
        let source = StaticSource::new().with_region(
            a,
            vec![
                FlightRecord::new("inside", "A388").with_position(5.0, 5.0),
                FlightRecord::new("outside", "A388").with_position(45.0, 5.0),
                FlightRecord::new("unknown", "A388"),
            ],
        );
        let snapshot = Fetcher::new(Arc::new(source), 1).fetch(&[a]).await;
        let ids: Vec<&str> = snapshot.flights.iter().map(|f| f.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["inside", "unknown"]);
    }

    #[tokio::test]
    async fn test_fetch_respects_concurrency_limit() {
        let regions = world_regions();
        let mut source = StaticSource::new();
        source.delay = Duration::from_millis(20);
        for r in &regions {
            source = source.with_region(*r, Vec::new());
        }
        let source = Arc::new(source);
        let fetcher = Fetcher::new(Arc::clone(&source) as Arc<dyn FlightSource>, 3);

        let snapshot = fetcher.fetch(&regions).await;
        assert!(snapshot.regions_failed.is_empty());
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_fetch_no_regions() {
        let fetcher = Fetcher::new(Arc::new(StaticSource::new()), 2);
        let snapshot = fetcher.fetch(&[]).await;
        assert_eq!(snapshot, FeedSnapshot::default());
    }

    #[test]
    fn test_dedup_keeps_first() {
        let flights = vec![
            FlightRecord::new("1", "A388").with_callsign("FIRST"),
            FlightRecord::new("2", "B744"),
            FlightRecord::new("1", "A388").with_callsign("SECOND"),
        ];
        let unique = dedup_by_flight_id(flights);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].callsign, "FIRST");
    }

    #[test]
    fn test_decode_feed() {
        let body = json!({
            "full_count": 12000,
            "version": 4,
            "3a4b5c6d": [
                "4CA1FA", 51.47, -0.45, 270, 3500, 160, "2201", "T-EGLL1", "A388",
                "G-XLEA", 1718000000, "LHR", "JFK", "BA175", 0, 1280, "BAW175", 0, "BAW"
            ],
            "stats": {"total": {}}
        });

        let flights = decode_feed(&body).unwrap();
        assert_eq!(flights.len(), 1);
        let flight = &flights[0];
        assert_eq!(flight.flight_id, "3a4b5c6d");
        assert_eq!(flight.type_code, "A388");
        assert_eq!(flight.callsign, "BAW175");
        assert_eq!(flight.registration, "G-XLEA");
        assert_eq!(flight.position, Position::new(51.47, -0.45));
        assert_eq!(flight.altitude, 3500);
        assert_eq!(flight.ground_speed, 160);
        assert_eq!(flight.track, 270);
        assert_eq!(flight.route().as_deref(), Some("LHR→JFK"));
    }

    #[test]
    fn test_decode_feed_blank_fields() {
        let body = json!({
            "abc": ["", 10.0, 20.0, 0, 0, 0, "", "", "", "", 0, "", " ", "", 1, 0, "", 0, ""]
        });
        let flights = decode_feed(&body).unwrap();
        assert_eq!(flights.len(), 1);
        assert!(flights[0].type_code.is_empty());
        assert!(flights[0].origin.is_none());
        assert!(flights[0].destination.is_none());
    }

    #[test]
    fn test_decode_feed_drops_malformed_entries() {
        let body = json!({
            "short": ["4CA1FA", 51.47, -0.45],
            "bad_lat": ["4CA1FA", "north", -0.45, 0, 0, 0, "", "", "A388", "", 0, "", "", "", 0, 0, "X"],
            "off_globe": ["4CA1FA", 91.0, -0.45, 0, 0, 0, "", "", "A388", "", 0, "", "", "", 0, 0, "X"]
        });
        assert!(decode_feed(&body).unwrap().is_empty());
    }

    #[test]
    fn test_decode_feed_rejects_non_object() {
        let err = decode_feed(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    const FEED_BODY: &str = r#"{
        "full_count": 12000,
        "version": 4,
        "3a4b5c6d": ["4CA1FA", 15.0, 35.0, 270, 35000, 480, "2201", "T-EGLL1", "A388",
                     "G-XLEA", 1718000000, "LHR", "JFK", "BA175", 0, 0, "BAW175", 0, "BAW"]
    }"#;

    fn api_for(stub: &StubServer) -> ApiConfig {
        ApiConfig {
            feed_url: stub.url.clone(),
            ..ApiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_http_feed_request_shape() {
        let stub = StubServer::start("/feed.js", 200, FEED_BODY).await;
        let feed = HttpFeed::new(&api_for(&stub)).unwrap();
        let region = BoundingBox::new(10.0, 20.0, 30.0, 40.0).unwrap();

        let flights = feed.fetch_region(&region).await.unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].callsign, "BAW175");

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        let seen = &requests[0];
        assert_eq!(seen.query["bounds"], "20.000,10.000,30.000,40.000");
        assert_eq!(seen.query["limit"], REGION_LIMIT.to_string());
        for (key, value) in FEED_FLAGS {
            assert_eq!(seen.query[key], value, "flag {key}");
        }
        assert_eq!(seen.headers["accept"], "application/json");
        assert_eq!(
            seen.headers["user-agent"],
            ApiConfig::default().user_agent.as_str()
        );
    }

    #[tokio::test]
    async fn test_http_feed_error_status() {
        let stub = StubServer::start("/feed.js", 503, "busy").await;
        let feed = HttpFeed::new(&api_for(&stub)).unwrap();
        let region = BoundingBox::new(10.0, 20.0, 30.0, 40.0).unwrap();

        let err = feed.fetch_region(&region).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_http_feed_undecodable_body() {
        let stub = StubServer::start("/feed.js", 200, "<html>").await;
        let feed = HttpFeed::new(&api_for(&stub)).unwrap();
        let region = BoundingBox::new(10.0, 20.0, 30.0, 40.0).unwrap();

        let err = feed.fetch_region(&region).await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
