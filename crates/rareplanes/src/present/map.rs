//! Interactive map output.
//!
//! Produces a single self-contained HTML document that loads Leaflet from a
//! CDN and draws one pin per rare flight. The same document is written to
//! disk by the CLI and served by the live server (with a refresh control).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{escape_html, format_thousands, EMPTY};
use crate::error::{Error, Result};
use crate::rarity::{EnrichedFlight, Tier};

/// Where the map centers when there is nothing to show.
const DEFAULT_CENTER: (f64, f64) = (30.0, 0.0);

/// Base URL for per-flight links.
const TRACKER_URL: &str = "https://www.flightradar24.com/";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>__TITLE__</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
html, body, #map { height: 100%; margin: 0; }
.rarity-marker { background: transparent !important; border: none !important; }
.rarity-pin {
    display: flex; align-items: center; justify-content: center;
    width: 40px; height: 20px; border-radius: 10px;
    color: white; font-size: 11px; font-weight: bold;
    font-family: Arial, sans-serif;
    text-shadow: 0 1px 2px rgba(0,0,0,0.5);
    box-shadow: 0 2px 4px rgba(0,0,0,0.4);
    border: 2px solid rgba(255,255,255,0.8);
}
.panel {
    position: fixed; z-index: 1000; background: white; padding: 10px 14px;
    border-radius: 8px; box-shadow: 0 2px 6px rgba(0,0,0,0.3);
    font-family: Arial, sans-serif; font-size: 13px;
}
#legend { bottom: 30px; left: 12px; }
#status { top: 12px; right: 12px; display: flex; align-items: center; gap: 10px; }
#challenges { top: 12px; left: 56px; max-width: 340px; background: #1a1a2e; color: #eee; }
#refresh-btn {
    background: #2196F3; color: white; border: none; padding: 6px 14px;
    border-radius: 5px; cursor: pointer; font-weight: bold;
}
.popup td { padding: 2px 8px 2px 0; }
.popup td:first-child { color: #666; font-weight: bold; }
</style>
</head>
<body>
<div id="map"></div>
<div id="legend" class="panel"><b>Rarity</b><br>__LEGEND__</div>
<div id="status" class="panel">__STATUS__</div>
__CHALLENGES__
<script>
var map = L.map('map').setView([__CENTER_LAT__, __CENTER_LON__], __ZOOM__);
L.tileLayer(__TILE_URL__, {
    attribution: __TILE_ATTRIBUTION__,
    subdomains: 'abcd',
    maxZoom: 19
}).addTo(map);
var markers = __MARKERS__;
markers.forEach(function (m) {
    var icon = L.divIcon({
        html: '<div class="rarity-pin" style="background:' + m.color + ';">' + m.label + '</div>',
        iconSize: [40, 20],
        iconAnchor: [20, 10],
        className: 'rarity-marker'
    });
    L.marker([m.lat, m.lon], { icon: icon })
        .bindPopup(m.popup, { maxWidth: 300 })
        .bindTooltip(m.tooltip)
        .addTo(map);
});
</script>
</body>
</html>
"#;

/// How to render a map document.
#[derive(Debug, Clone)]
pub struct MapOptions<'a> {
    /// Page title.
    pub title: &'a str,
    /// Threshold the flights were filtered with.
    pub min_rarity: f64,
    /// Challenge texts to list in a side panel.
    pub challenges: &'a [String],
    /// Tile layer URL template.
    pub tile_url: &'a str,
    /// Tile layer attribution (HTML).
    pub tile_attribution: &'a str,
    /// Add a refresh control that reloads the page.
    pub live: bool,
    /// When the underlying scan ran.
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    color: &'static str,
    label: String,
    tooltip: String,
    popup: String,
}

impl Marker {
    fn from_flight(entry: &EnrichedFlight) -> Self {
        let score = entry.rarity_score();
        Self {
            lat: entry.flight.position.lat,
            lon: entry.flight.position.lon,
            color: entry.tier.color(),
            label: format!("{score:.1}"),
            tooltip: escape_html(&format!(
                "{} | {score:.2} ({}) | {} XP",
                entry.aircraft.name,
                entry.tier,
                format_thousands(i64::try_from(entry.aircraft.xp).unwrap_or(i64::MAX))
            )),
            popup: popup_html(entry),
        }
    }
}

fn popup_html(entry: &EnrichedFlight) -> String {
    let flight = &entry.flight;
    let aircraft = &entry.aircraft;
    let or_empty = |s: &str| {
        if s.is_empty() {
            EMPTY.to_string()
        } else {
            escape_html(s)
        }
    };

    let rows = [
        (
            "Rarity",
            format!("<b>{:.2}</b> ({})", entry.rarity_score(), entry.tier),
        ),
        (
            "XP",
            format_thousands(i64::try_from(aircraft.xp).unwrap_or(i64::MAX)),
        ),
        ("Type", escape_html(&aircraft.type_code)),
        ("Reg", or_empty(&flight.registration)),
        ("Callsign", or_empty(&flight.callsign)),
        (
            "Route",
            flight
                .route()
                .map_or_else(|| EMPTY.to_string(), |r| escape_html(&r)),
        ),
        (
            "Altitude",
            format!("{} ft", format_thousands(flight.altitude)),
        ),
        ("Speed", format!("{} kts", flight.ground_speed)),
    ];

    let mut html = format!(
        "<div class=\"popup\"><h4 style=\"margin:0 0 8px 0;\">{}</h4><table>",
        escape_html(&aircraft.name)
    );
    for (label, value) in rows {
        html.push_str(&format!("<tr><td>{label}</td><td>{value}</td></tr>"));
    }
    html.push_str("</table>");
    if !flight.callsign.is_empty() {
        html.push_str(&format!(
            "<a href=\"{TRACKER_URL}{}\" target=\"_blank\" rel=\"noopener\">View on FlightRadar24</a>",
            escape_html(&flight.callsign)
        ));
    }
    html.push_str("</div>");
    html
}

fn legend_html() -> String {
    Tier::ALL
        .iter()
        .map(|tier| {
            let range = match tier {
                Tier::UltraPlus => "10+".to_string(),
                other => format!("{}&ndash;{}", other.min_score(), other.min_score() + 2.0),
            };
            format!(
                "<span style=\"color:{};\">&#9679;</span> {range} {}",
                tier.color(),
                escape_html(tier.label())
            )
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

fn status_html(count: usize, options: &MapOptions<'_>) -> String {
    let mut html = format!(
        "<span><b>{count} planes</b> with rarity &ge; {}</span><span style=\"color:#888;\">updated {}</span>",
        options.min_rarity,
        options.generated_at.format("%H:%M UTC")
    );
    if options.live {
        html.push_str(
            "<button id=\"refresh-btn\" onclick=\"this.textContent='Loading...';this.disabled=true;window.location.reload();\">Refresh</button>",
        );
    }
    html
}

fn challenges_html(challenges: &[String]) -> String {
    if challenges.is_empty() {
        return String::new();
    }
    let items: String = challenges
        .iter()
        .enumerate()
        .map(|(i, text)| format!("<div>{}. {}</div>", i + 1, escape_html(text)))
        .collect();
    format!("<div id=\"challenges\" class=\"panel\"><b>TODAY'S CHALLENGES</b>{items}</div>")
}

/// Mean marker position. Longitude is averaged on the circle so pins on both
/// sides of the antimeridian center near it, not on the prime meridian.
fn map_center(markers: &[Marker]) -> Option<(f64, f64)> {
    if markers.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = markers.len() as f64;
    let lat = markers.iter().map(|m| m.lat).sum::<f64>() / n;
    let (sin, cos) = markers.iter().fold((0.0, 0.0), |(sin, cos), m| {
        let lon = m.lon.to_radians();
        (sin + lon.sin(), cos + lon.cos())
    });
    Some((lat, sin.atan2(cos).to_degrees()))
}

/// Serialize a value as a JS literal that is safe inside a `<script>` block.
fn script_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Render the map document for a set of flights.
///
/// Flights without a known position are left off the map.
///
/// # Errors
///
/// Returns an error if the marker data cannot be serialized.
pub fn render_map(flights: &[EnrichedFlight], options: &MapOptions<'_>) -> Result<String> {
    let markers: Vec<Marker> = flights
        .iter()
        .filter(|f| !f.flight.position.is_unknown())
        .map(Marker::from_flight)
        .collect();

    let ((center_lat, center_lon), zoom) = match map_center(&markers) {
        Some(center) => (center, 3),
        None => (DEFAULT_CENTER, 2),
    };

    Ok(TEMPLATE
        .replace("__TITLE__", &escape_html(options.title))
        .replace("__LEGEND__", &legend_html())
        .replace("__STATUS__", &status_html(markers.len(), options))
        .replace("__CHALLENGES__", &challenges_html(options.challenges))
        .replace("__CENTER_LAT__", &format!("{center_lat:.4}"))
        .replace("__CENTER_LON__", &format!("{center_lon:.4}"))
        .replace("__ZOOM__", &zoom.to_string())
        .replace("__TILE_URL__", &script_literal(options.tile_url)?)
        .replace(
            "__TILE_ATTRIBUTION__",
            &script_literal(options.tile_attribution)?,
        )
        .replace("__MARKERS__", &script_literal(&markers)?))
}

/// Write a rendered map to `path`, returning its absolute location.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_map(path: &Path, html: &str) -> Result<PathBuf> {
    std::fs::write(path, html).map_err(|source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    })?;

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    info!(path = %absolute.display(), "Map written");
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AircraftType;
    use crate::flight::FlightRecord;

    fn options<'a>(challenges: &'a [String], live: bool) -> MapOptions<'a> {
        MapOptions {
            title: "Rare planes",
            min_rarity: 10.0,
            challenges,
            tile_url: "https://tiles.test/{z}/{x}/{y}.png",
            tile_attribution: "&copy; test",
            live,
            generated_at: Utc::now(),
        }
    }

    fn flight(id: &str, callsign: &str, lat: f64, lon: f64) -> EnrichedFlight {
        let mut record = FlightRecord::new(id, "A388")
            .with_callsign(callsign)
            .with_position(lat, lon)
            .with_route(Some("DXB"), Some("LHR"));
        record.altitude = 38_000;
        record.ground_speed = 480;
        let mut aircraft = AircraftType::new("A388", 11.0).with_name("Airbus A380-800");
        aircraft.xp = 12_500;
        EnrichedFlight::new(record, aircraft)
    }

    /// Pull the JSON array assigned to `var markers` back out of the page.
    fn markers_in(html: &str) -> Vec<serde_json::Value> {
        let start = html.find("var markers = ").unwrap() + "var markers = ".len();
        let end = start + html[start..].find(";\n").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn test_one_marker_per_flight() {
        let flights = vec![flight("1", "UAE1", 25.0, 55.0), flight("2", "UAE2", 51.0, 0.0)];
        let html = render_map(&flights, &options(&[], false)).unwrap();
        let markers = markers_in(&html);

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0]["lat"], 25.0);
        assert_eq!(markers[0]["color"], Tier::UltraPlus.color());
        assert_eq!(markers[0]["label"], "11.0");
    }

    #[test]
    fn test_popup_contents() {
        let html = render_map(&[flight("1", "UAE1", 25.0, 55.0)], &options(&[], false)).unwrap();
        let markers = markers_in(&html);
        let popup = markers[0]["popup"].as_str().unwrap();

        assert!(popup.contains("Airbus A380-800"));
        assert!(popup.contains("UAE1"));
        assert!(popup.contains("A388"));
        assert!(popup.contains("DXB→LHR"));
        assert!(popup.contains("38,000 ft"));
        assert!(popup.contains("480 kts"));
        assert!(popup.contains("12,500"));
        assert!(popup.contains("Ultra+"));
        assert!(popup.contains("https://www.flightradar24.com/UAE1"));
    }

    #[test]
    fn test_popup_without_callsign_has_no_link() {
        let html = render_map(&[flight("1", "", 25.0, 55.0)], &options(&[], false)).unwrap();
        let popup = markers_in(&html)[0]["popup"].as_str().unwrap().to_string();
        assert!(!popup.contains("flightradar24"));
    }

    #[test]
    fn test_unknown_positions_are_skipped() {
        let flights = vec![flight("1", "A", 0.0, 0.0), flight("2", "B", 10.0, 20.0)];
        let html = render_map(&flights, &options(&[], false)).unwrap();
        assert_eq!(markers_in(&html).len(), 1);
        assert!(html.contains("<b>1 planes</b>"));
        assert!(html.contains("setView([10.0000, 20.0000], 3)"));
    }

    #[test]
    fn test_center_across_antimeridian() {
        let flights = vec![flight("1", "A", 10.0, 179.0), flight("2", "B", 20.0, -179.0)];
        let markers: Vec<Marker> = flights.iter().map(Marker::from_flight).collect();
        let (lat, lon) = map_center(&markers).unwrap();

        assert!((lat - 15.0).abs() < 1e-9);
        assert!(lon.abs() > 179.9, "centered at {lon}");
    }

    #[test]
    fn test_center_plain_mean() {
        let flights = vec![flight("1", "A", 10.0, 10.0), flight("2", "B", 20.0, 30.0)];
        let markers: Vec<Marker> = flights.iter().map(Marker::from_flight).collect();
        let (lat, lon) = map_center(&markers).unwrap();

        assert!((lat - 15.0).abs() < 1e-9);
        assert!((lon - 20.0).abs() < 1e-9);
        assert!(map_center(&[]).is_none());
    }

    #[test]
    fn test_empty_map_uses_default_center() {
        let html = render_map(&[], &options(&[], false)).unwrap();
        assert!(markers_in(&html).is_empty());
        assert!(html.contains("setView([30.0000, 0.0000], 2)"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut entry = flight("1", "<script>", 10.0, 10.0);
        entry.aircraft.name = "</script><b>x</b>".to_string();
        let html = render_map(&[entry], &options(&[], false)).unwrap();

        assert!(!html.contains("</script><b>"));
        assert!(!html.contains("<script>\""));
        assert_eq!(markers_in(&html).len(), 1);
    }

    #[test]
    fn test_legend_lists_every_tier() {
        let html = render_map(&[], &options(&[], false)).unwrap();
        for tier in Tier::ALL {
            assert!(html.contains(tier.color()));
        }
        assert!(html.contains("10+ Ultra+"));
        assert!(html.contains("0&ndash;2 Common"));
    }

    #[test]
    fn test_challenges_panel() {
        let challenges = vec!["Spot a <A380>".to_string()];
        let html = render_map(&[], &options(&challenges, false)).unwrap();
        assert!(html.contains("TODAY'S CHALLENGES"));
        assert!(html.contains("1. Spot a &lt;A380&gt;"));

        let html = render_map(&[], &options(&[], false)).unwrap();
        assert!(!html.contains("TODAY'S CHALLENGES"));
    }

    #[test]
    fn test_live_map_has_refresh_control() {
        let html = render_map(&[], &options(&[], true)).unwrap();
        assert!(html.contains("id=\"refresh-btn\""));
        assert!(html.contains("window.location.reload()"));

        let html = render_map(&[], &options(&[], false)).unwrap();
        assert!(!html.contains("refresh-btn\""));
    }

    #[test]
    fn test_write_map() {
        let path =
            std::env::temp_dir().join(format!("rareplanes-test-{}.html", std::process::id()));
        let written = write_map(&path, "<html></html>").unwrap();

        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_map_bad_directory() {
        let err = write_map(Path::new("/nonexistent/dir/map.html"), "x").unwrap_err();
        assert!(matches!(err, Error::OutputWrite { .. }));
    }
}
