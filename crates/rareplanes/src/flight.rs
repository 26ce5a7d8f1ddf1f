//! Live flight records and the geographic regions they are fetched by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The world partition as latitude bands, each split at its own longitudes.
///
/// Bands are cut finer over North America, Europe and East Asia so that no
/// single region there holds more traffic than one feed request returns.
const WORLD_BANDS: [(f64, f64, &[f64]); 6] = [
    (-90.0, -20.0, &[-180.0, -60.0, 0.0, 60.0, 120.0, 180.0]),
    (-20.0, 20.0, &[-180.0, -90.0, -30.0, 30.0, 90.0, 180.0]),
    (
        20.0,
        40.0,
        &[
            -180.0, -125.0, -105.0, -90.0, -75.0, -30.0, 0.0, 20.0, 40.0, 70.0, 100.0, 115.0,
            130.0, 180.0,
        ],
    ),
    (
        40.0,
        50.0,
        &[
            -180.0, -125.0, -105.0, -90.0, -75.0, -30.0, -5.0, 5.0, 15.0, 30.0, 60.0, 100.0,
            130.0, 180.0,
        ],
    ),
    (
        50.0,
        60.0,
        &[-180.0, -130.0, -60.0, -15.0, -5.0, 5.0, 15.0, 30.0, 60.0, 180.0],
    ),
    (60.0, 90.0, &[-180.0, -60.0, 0.0, 60.0, 180.0]),
];

/// A geographic bounding box, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge latitude.
    pub south: f64,
    /// Northern edge latitude.
    pub north: f64,
    /// Western edge longitude.
    pub west: f64,
    /// Eastern edge longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Create a validated bounding box.
    ///
    /// `west` may be greater than `east` for boxes that cross the antimeridian.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate is out of range or `south >= north`.
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> Result<Self> {
        let raw = format!("{south},{north},{west},{east}");
        for lat in [south, north] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(Error::invalid_bounds(
                    raw,
                    format!("latitude {lat} is outside [-90, 90]"),
                ));
            }
        }
        for lon in [west, east] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(Error::invalid_bounds(
                    raw,
                    format!("longitude {lon} is outside [-180, 180]"),
                ));
            }
        }
        if south >= north {
            return Err(Error::invalid_bounds(raw, "south must be less than north"));
        }
        Ok(Self {
            south,
            north,
            west,
            east,
        })
    }

    /// Check whether a position lies inside this box (edges included).
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        let lat_ok = position.lat >= self.south && position.lat <= self.north;
        let lon_ok = if self.west <= self.east {
            position.lon >= self.west && position.lon <= self.east
        } else {
            position.lon >= self.west || position.lon <= self.east
        };
        lat_ok && lon_ok
    }
}

impl FromStr for BoundingBox {
    type Err = Error;

    /// Parse `south,north,west,east`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::invalid_bounds(
                s,
                "expected 4 comma-separated numbers: south,north,west,east",
            ));
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::invalid_bounds(s, format!("'{part}' is not a number")))?;
        }

        let [south, north, west, east] = values;
        Self::new(south, north, west, east)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.south, self.north, self.west, self.east
        )
    }
}

/// The fixed partition of the globe used for worldwide fetches.
///
/// Neighbouring regions share their edges, so a flight sitting on a
/// boundary can be returned twice.
#[must_use]
pub fn world_regions() -> Vec<BoundingBox> {
    WORLD_BANDS
        .iter()
        .flat_map(|&(south, north, cuts)| {
            cuts.windows(2).map(move |edge| BoundingBox {
                south,
                north,
                west: edge[0],
                east: edge[1],
            })
        })
        .collect()
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The feed reports unknown positions as 0,0.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// One aircraft currently reported by the live feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Feed-assigned identifier, unique per flight.
    pub flight_id: String,
    /// ICAO aircraft type designator (e.g. `A388`).
    pub type_code: String,
    /// ATC callsign; empty when not broadcast.
    pub callsign: String,
    /// Aircraft registration; empty when unknown.
    pub registration: String,
    /// Last reported position.
    pub position: Position,
    /// Barometric altitude in feet.
    pub altitude: i64,
    /// Ground speed in knots.
    pub ground_speed: i64,
    /// Heading over ground in degrees.
    pub track: i64,
    /// Origin airport code (IATA).
    pub origin: Option<String>,
    /// Destination airport code (IATA).
    pub destination: Option<String>,
}

impl FlightRecord {
    /// Create a record with only an id and a type code set.
    #[must_use]
    pub fn new(flight_id: impl Into<String>, type_code: impl Into<String>) -> Self {
        Self {
            flight_id: flight_id.into(),
            type_code: type_code.into(),
            ..Self::default()
        }
    }

    /// Set the callsign.
    #[must_use]
    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = callsign.into();
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.position = Position::new(lat, lon);
        self
    }

    /// Set origin and destination.
    #[must_use]
    pub fn with_route(mut self, origin: Option<&str>, destination: Option<&str>) -> Self {
        self.origin = origin.map(str::to_string);
        self.destination = destination.map(str::to_string);
        self
    }

    /// Human-readable route, e.g. `LHR→JFK`.
    ///
    /// Falls back to whichever endpoint is known, or `None` if neither is.
    #[must_use]
    pub fn route(&self) -> Option<String> {
        match (self.origin.as_deref(), self.destination.as_deref()) {
            (Some(origin), Some(destination)) => Some(format!("{origin}→{destination}")),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        }
    }
}
