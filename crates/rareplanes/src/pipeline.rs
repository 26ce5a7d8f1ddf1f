//! The fetch, join and filter chain shared by the CLI and the live server.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::Catalog;
use crate::feed::{Fetcher, RegionFailure};
use crate::flight::BoundingBox;
use crate::rarity::{find_rare, EnrichedFlight};

/// The outcome of one scan of the skies.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Rare flights, rarest first.
    pub matches: Vec<EnrichedFlight>,
    /// Unique flights returned by the feed before filtering.
    pub flights_scanned: usize,
    /// Number of regions requested.
    pub regions_total: usize,
    /// Regions skipped because their fetch failed.
    pub regions_failed: Vec<RegionFailure>,
    /// Regions whose results were cut off at the feed's limit.
    pub regions_truncated: Vec<BoundingBox>,
    /// Threshold the matches were filtered with.
    pub min_rarity: f64,
    /// When the scan ran.
    pub scanned_at: DateTime<Utc>,
}

impl Scan {
    /// Check whether no region could be fetched at all.
    #[must_use]
    pub fn feed_unreachable(&self) -> bool {
        self.regions_total > 0 && self.regions_failed.len() == self.regions_total
    }
}

/// Runs one scan: fetch every region, join against the catalog, filter.
#[derive(Debug, Clone)]
pub struct Pipeline {
    fetcher: Fetcher,
    regions: Vec<BoundingBox>,
    min_rarity: f64,
}

impl Pipeline {
    /// Create a pipeline over a fixed set of regions.
    #[must_use]
    pub fn new(fetcher: Fetcher, regions: Vec<BoundingBox>, min_rarity: f64) -> Self {
        Self {
            fetcher,
            regions,
            min_rarity,
        }
    }

    /// The configured rarity threshold.
    #[must_use]
    pub fn min_rarity(&self) -> f64 {
        self.min_rarity
    }

    /// The regions each scan fetches.
    #[must_use]
    pub fn regions(&self) -> &[BoundingBox] {
        &self.regions
    }

    /// Fetch live flights and return the rare ones.
    ///
    /// Never fails: unreachable regions are recorded in the result and an
    /// empty sky is simply a scan with no matches.
    pub async fn run(&self, catalog: &Catalog) -> Scan {
        let scanned_at = Utc::now();
        let snapshot = self.fetcher.fetch(&self.regions).await;
        let matches = find_rare(&snapshot.flights, catalog, self.min_rarity);

        info!(
            scanned = snapshot.flights.len(),
            matches = matches.len(),
            min_rarity = self.min_rarity,
            "Scan complete"
        );

        Scan {
            flights_scanned: snapshot.flights.len(),
            regions_total: snapshot.regions_total,
            regions_failed: snapshot.regions_failed,
            regions_truncated: snapshot.regions_truncated,
            matches,
            min_rarity: self.min_rarity,
            scanned_at,
        }
    }
}
