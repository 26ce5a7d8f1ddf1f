//! Terminal table output.

use std::fmt::Write as _;

use super::{format_thousands, EMPTY};
use crate::pipeline::Scan;
use crate::rarity::EnrichedFlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

const COLUMNS: [(&str, Align); 7] = [
    ("#", Align::Right),
    ("Callsign", Align::Left),
    ("Type", Align::Left),
    ("Rarity", Align::Right),
    ("Tier", Align::Left),
    ("Alt", Align::Right),
    ("Route", Align::Left),
];

fn cells(rank: usize, entry: &EnrichedFlight) -> [String; 7] {
    let flight = &entry.flight;
    let aircraft = &entry.aircraft;

    let callsign = if flight.callsign.is_empty() {
        EMPTY.to_string()
    } else {
        flight.callsign.clone()
    };
    let type_display = if aircraft.name == aircraft.type_code {
        aircraft.type_code.clone()
    } else {
        format!("{} ({})", aircraft.name, aircraft.type_code)
    };
    let altitude = if flight.altitude == 0 {
        EMPTY.to_string()
    } else {
        format_thousands(flight.altitude)
    };

    [
        rank.to_string(),
        callsign,
        type_display,
        format!("{:.2}", entry.rarity_score()),
        entry.tier.label().to_string(),
        altitude,
        flight.route().unwrap_or_else(|| EMPTY.to_string()),
    ]
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}

fn push_line(out: &mut String, row: &[String], widths: &[usize]) {
    let line: Vec<String> = row
        .iter()
        .zip(widths)
        .zip(COLUMNS)
        .map(|((cell, &width), (_, align))| pad(cell, width, align))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Render flights as an aligned text table, ranked from 1.
///
/// At most `max_rows` flights are shown.
#[must_use]
pub fn render_table(flights: &[EnrichedFlight], max_rows: usize) -> String {
    let rows: Vec<[String; 7]> = flights
        .iter()
        .take(max_rows)
        .enumerate()
        .map(|(i, f)| cells(i + 1, f))
        .collect();

    let mut widths: Vec<usize> = COLUMNS.iter().map(|(title, _)| title.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = COLUMNS.iter().map(|(title, _)| (*title).to_string()).collect();
    push_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out
}

/// Render the full terminal report for a scan.
///
/// Includes the scan summary, any failed regions, the active challenges and
/// either the table or a hint when nothing matched.
#[must_use]
pub fn render_report(scan: &Scan, challenges: &[String], max_rows: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Scanned {} flights across {} regions, found {} with rarity >= {}",
        format_thousands(i64::try_from(scan.flights_scanned).unwrap_or(i64::MAX)),
        scan.regions_total,
        scan.matches.len(),
        scan.min_rarity
    );
    if scan.feed_unreachable() {
        let _ = writeln!(
            out,
            "Error: the flight feed could not be reached for any of the {} regions",
            scan.regions_total
        );
    } else if !scan.regions_failed.is_empty() {
        let _ = writeln!(
            out,
            "Warning: {} of {} regions could not be fetched and were skipped",
            scan.regions_failed.len(),
            scan.regions_total
        );
    }
    if !scan.regions_truncated.is_empty() {
        let _ = writeln!(
            out,
            "Warning: {} regions hit the feed limit, some flights may be missing",
            scan.regions_truncated.len()
        );
    }

    if !challenges.is_empty() {
        out.push_str("\nToday's challenges:\n");
        for (i, challenge) in challenges.iter().enumerate() {
            let _ = writeln!(out, "  {}. {challenge}", i + 1);
        }
    }
    out.push('\n');

    if scan.feed_unreachable() {
        out.push_str("No live flights were fetched. Check your network connection.\n");
        return out;
    }
    if scan.matches.is_empty() {
        let _ = writeln!(out, "No planes found with rarity >= {}.", scan.min_rarity);
        out.push_str(
            "Try lowering --min-rarity (e.g. --min-rarity 8 for all Ultras, \
             --min-rarity 6 for Rare and above)\n",
        );
        return out;
    }

    let _ = writeln!(out, "Rare planes flying now (rarity >= {})\n", scan.min_rarity);
    out.push_str(&render_table(&scan.matches, max_rows));
    if scan.matches.len() > max_rows {
        let _ = writeln!(
            out,
            "\n(showing top {max_rows} of {} results)",
            scan.matches.len()
        );
    }
    out
}
