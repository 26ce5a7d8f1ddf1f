//! `rareplanes` - Find rare aircraft flying right now
//!
//! This library fetches live flights, joins them against the Skycards
//! aircraft rarity catalog, and renders the rarest ones as a terminal table
//! and an interactive map, either once or from a live server.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod flight;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod present;
pub mod rarity;
pub mod server;

pub use catalog::{AircraftType, Catalog, CatalogClient, CatalogSource};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{Fetcher, FlightSource, HttpFeed};
pub use flight::{world_regions, BoundingBox, FlightRecord, Position};
pub use logging::init_logging;
pub use pipeline::{Pipeline, Scan};
pub use rarity::{find_rare, EnrichedFlight, Tier};
