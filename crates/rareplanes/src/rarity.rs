//! Joining live flights to the rarity catalog.
//!
//! This is the core of the tool: each flight is looked up by type code,
//! flights of unknown types are dropped, the rest are tiered, filtered by a
//! minimum score and sorted rarest first.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::catalog::{AircraftType, Catalog};
use crate::flight::FlightRecord;

/// Rarity tier, from most common to rarest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Score below 2.
    Common,
    /// Score in [2, 4).
    Uncommon,
    /// Score in [4, 6).
    Scarce,
    /// Score in [6, 8).
    Rare,
    /// Score in [8, 10).
    Ultra,
    /// Score of 10 or more.
    UltraPlus,
}

impl Tier {
    /// Every tier, rarest first.
    pub const ALL: [Tier; 6] = [
        Tier::UltraPlus,
        Tier::Ultra,
        Tier::Rare,
        Tier::Scarce,
        Tier::Uncommon,
        Tier::Common,
    ];

    /// Bucket a rarity score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 10.0 {
            Self::UltraPlus
        } else if score >= 8.0 {
            Self::Ultra
        } else if score >= 6.0 {
            Self::Rare
        } else if score >= 4.0 {
            Self::Scarce
        } else if score >= 2.0 {
            Self::Uncommon
        } else {
            Self::Common
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Scarce => "Scarce",
            Self::Rare => "Rare",
            Self::Ultra => "Ultra",
            Self::UltraPlus => "Ultra+",
        }
    }

    /// Lowest score that falls in this tier.
    #[must_use]
    pub fn min_score(self) -> f64 {
        match self {
            Self::Common => 0.0,
            Self::Uncommon => 2.0,
            Self::Scarce => 4.0,
            Self::Rare => 6.0,
            Self::Ultra => 8.0,
            Self::UltraPlus => 10.0,
        }
    }

    /// Marker color on the map.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Common => "#808080",
            Self::Uncommon => "#1E90FF",
            Self::Scarce => "#228B22",
            Self::Rare => "#FF8C00",
            Self::Ultra => "#DC143C",
            Self::UltraPlus => "#8B0000",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A live flight joined to its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedFlight {
    /// The flight as reported by the feed.
    pub flight: FlightRecord,
    /// The matching catalog entry.
    pub aircraft: AircraftType,
    /// Tier derived from the aircraft's rarity score.
    pub tier: Tier,
}

impl EnrichedFlight {
    /// Join a flight to an aircraft type.
    #[must_use]
    pub fn new(flight: FlightRecord, aircraft: AircraftType) -> Self {
        let tier = Tier::from_score(aircraft.rarity_score);
        Self {
            flight,
            aircraft,
            tier,
        }
    }

    /// The aircraft's rarity score.
    #[must_use]
    pub fn rarity_score(&self) -> f64 {
        self.aircraft.rarity_score
    }
}

/// Rarest first, then callsign ascending, then flight id.
fn rank_order(a: &EnrichedFlight, b: &EnrichedFlight) -> Ordering {
    b.rarity_score()
        .total_cmp(&a.rarity_score())
        .then_with(|| a.flight.callsign.cmp(&b.flight.callsign))
        .then_with(|| a.flight.flight_id.cmp(&b.flight.flight_id))
}

/// Join flights to the catalog, keep those at or above `min_rarity`, and sort.
///
/// Flights whose type code is not in the catalog are dropped.
#[must_use]
pub fn find_rare(
    flights: &[FlightRecord],
    catalog: &Catalog,
    min_rarity: f64,
) -> Vec<EnrichedFlight> {
    let mut matches: Vec<EnrichedFlight> = flights
        .iter()
        .filter_map(|flight| {
            let aircraft = catalog.get(&flight.type_code)?;
            (aircraft.rarity_score >= min_rarity)
                .then(|| EnrichedFlight::new(flight.clone(), aircraft.clone()))
        })
        .collect();

    matches.sort_by(rank_order);
    matches
}
