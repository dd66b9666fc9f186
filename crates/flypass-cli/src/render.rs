// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use flypass_core::cache::CachedSearch;
use flypass_core::flight::{format_stay, time_at_destination, Flight};
use flypass_core::returns::with_min_layover;
use flypass_core::search::{ReturnLookup, SearchReport};
use flypass_core::settings::Settings;
use std::collections::BTreeMap;
use std::fmt::Write;

/// `Monday, January 1, 2024`
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// `Monday, Jan 1`
pub fn short_date(date: NaiveDate) -> String {
    date.format("%A, %b %-d").to_string()
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn clock(time: &str, offset: &str) -> String {
    if offset.is_empty() {
        time.to_string()
    } else {
        format!("{} ({})", time, offset)
    }
}

fn station(text: &str, code: &str) -> String {
    if text.is_empty() {
        code.to_string()
    } else {
        text.to_string()
    }
}

/// The next `count` dates a search can be run for, starting today.
pub fn selectable_dates(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    today.iter_days().take(count).collect()
}

pub fn render_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| format!("{}  {}\n", d.format("%Y-%m-%d"), short_date(*d)))
        .collect()
}

fn render_flight(out: &mut String, flight: &Flight) {
    let _ = writeln!(out, "  {}", flight.route_label());
    let _ = writeln!(
        out,
        "    Departure: {}   Arrival: {}   Duration: {}",
        clock(&flight.departure, &flight.departure_offset_text),
        clock(&flight.arrival, &flight.arrival_offset_text),
        flight.duration
    );
}

/// Flights grouped under a heading per departure date.
pub fn render_flights(flights: &[Flight]) -> String {
    let mut by_date: BTreeMap<String, Vec<&Flight>> = BTreeMap::new();
    for flight in flights {
        by_date
            .entry(flight.departure_date.chars().take(10).collect())
            .or_default()
            .push(flight);
    }

    let mut out = String::new();
    for (day, flights) in by_date {
        let heading = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .map(long_date)
            .unwrap_or(day);
        let _ = writeln!(out, "{}", heading);
        for flight in flights {
            render_flight(&mut out, flight);
        }
        out.push('\n');
    }
    out
}

/// Return flights that leave at least the minimum layover after landing.
pub fn render_returns(lookup: &ReturnLookup, settings: &Settings) -> String {
    let min_layover = settings.min_layover();
    let valid = with_min_layover(&lookup.outbound, &lookup.returns, min_layover);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  Return flights for {} ({} found)",
        lookup.outbound.flight_code,
        valid.len()
    );
    if !lookup.complete {
        let _ = writeln!(
            out,
            "    Some dates could not be checked; these results are incomplete and were not cached."
        );
    }
    if valid.is_empty() {
        let _ = writeln!(
            out,
            "    No valid (>{}h until return) flights found within {} days of arrival.",
            min_layover.num_hours(),
            settings.return_window_days
        );
        return out;
    }

    for flight in &valid {
        let _ = writeln!(
            out,
            "    {} to {} - {}",
            station(&flight.departure_station_text, &flight.departure_station),
            station(&flight.arrival_station_text, &flight.arrival_station),
            flight.flight_code
        );
        if let Some(day) = flight.date() {
            let _ = writeln!(out, "      Date: {}", short_date(day));
        }
        let _ = writeln!(
            out,
            "      Departure: {}   Arrival: {}   Duration: {}",
            clock(&flight.departure, &flight.departure_offset_text),
            clock(&flight.arrival, &flight.arrival_offset_text),
            flight.duration
        );
        if let Some(stay) = time_at_destination(&lookup.outbound, flight) {
            let _ = writeln!(out, "      Time until return: {}", format_stay(stay));
        }
    }
    out
}

pub fn render_report(report: &SearchReport, settings: &Settings) -> String {
    let mut out = String::new();

    if report.from_cache {
        let _ = writeln!(
            out,
            "Showing cached results for {} on {}",
            report.origin,
            long_date(report.date)
        );
        if let Some(at) = report.cached_at {
            let _ = writeln!(out, "Cache date: {}", local_time(at));
        }
        let _ = writeln!(
            out,
            "Using cached results. Run again with --refresh to fetch new data.\n"
        );
    }

    if report.rate_limited {
        let _ = writeln!(
            out,
            "Rate limited by the server. Results are partial and were not cached; try again later.\n"
        );
    } else if !report.failures.is_empty() {
        let _ = writeln!(
            out,
            "{} of {} routes could not be checked:",
            report.failures.len(),
            report.destinations
        );
        for failure in &report.failures {
            let _ = writeln!(out, "  {}: {}", failure.destination, failure.error);
        }
        out.push('\n');
    }

    if report.flights.is_empty() {
        let _ = writeln!(
            out,
            "No flights found from {} on {}.",
            report.origin,
            long_date(report.date)
        );
        return out;
    }

    out.push_str(&render_flights(&report.flights));
    for lookup in &report.returns {
        out.push_str(&render_returns(lookup, settings));
        out.push('\n');
    }
    out
}

/// Cached searches, one per line: `LTN - Monday, Jan 1`.
pub fn render_cache_list(searches: &[CachedSearch], ttl: Duration) -> String {
    if searches.is_empty() {
        return "Searched flights will appear here.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Last Results ({}h)", ttl.num_hours());
    for search in searches {
        let _ = writeln!(
            out,
            "  {} - {}   [{}] {} flights",
            search.origin,
            short_date(search.date),
            search.key,
            search.flight_count
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flypass_core::scan::RouteFailure;

    fn flight(code: &str, day: &str, dep: &str, arr: &str) -> Flight {
        Flight {
            departure_station: "LTN".into(),
            arrival_station: "BVA".into(),
            departure_station_text: "London Luton".into(),
            arrival_station_text: "Paris Beauvais".into(),
            flight_code: code.into(),
            departure_date: day.into(),
            departure: dep.into(),
            departure_offset_text: "UTC".into(),
            arrival: arr.into(),
            arrival_offset_text: "UTC+1".into(),
            duration: "01:05".into(),
        }
    }

    fn report(flights: Vec<Flight>) -> SearchReport {
        SearchReport {
            origin: "LTN".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            key: "LTN-2024-01-01".into(),
            flights,
            from_cache: false,
            cached_at: None,
            destinations: 3,
            failures: Vec::new(),
            rate_limited: false,
            returns: Vec::new(),
        }
    }

    #[test]
    fn test_dates() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(long_date(day), "Monday, January 1, 2024");
        assert_eq!(short_date(day), "Monday, Jan 1");

        let dates = selectable_dates(day, 4);
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[3], NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert!(render_dates(&dates).starts_with("2024-01-01  Monday, Jan 1\n"));
    }

    #[test]
    fn test_flights_grouped_by_date() {
        let text = render_flights(&[
            flight("W6 2", "2024-01-02T00:00:00", "07:00", "09:05"),
            flight("W6 1", "2024-01-01T00:00:00", "06:00", "08:05"),
        ]);
        let first = text.find("Monday, January 1, 2024").unwrap();
        let second = text.find("Tuesday, January 2, 2024").unwrap();
        assert!(first < second);
        assert!(text.contains("Departure: 06:00 (UTC)   Arrival: 08:05 (UTC+1)   Duration: 01:05"));
    }

    #[test]
    fn test_cached_report_has_refresh_hint() {
        let mut report = report(vec![flight("W6 1", "2024-01-01", "06:00", "08:05")]);
        report.from_cache = true;
        report.cached_at = DateTime::from_timestamp_millis(1_704_067_200_000);
        let text = render_report(&report, &Settings::default());
        assert!(text.starts_with("Showing cached results for LTN on Monday, January 1, 2024"));
        assert!(text.contains("Cache date: "));
        assert!(text.contains("--refresh"));
    }

    #[test]
    fn test_rate_limit_and_failures() {
        let mut limited = report(vec![]);
        limited.rate_limited = true;
        let text = render_report(&limited, &Settings::default());
        assert!(text.contains("Rate limited"));
        assert!(text.contains("No flights found from LTN"));

        let mut failed = report(vec![flight("W6 1", "2024-01-01", "06:00", "08:05")]);
        failed.failures.push(RouteFailure {
            destination: "WAW".into(),
            error: "HTTP error! status: 500".into(),
        });
        let text = render_report(&failed, &Settings::default());
        assert!(text.contains("1 of 3 routes could not be checked:"));
        assert!(text.contains("WAW: HTTP error! status: 500"));
    }

    #[test]
    fn test_returns_respect_layover() {
        let outbound = flight("W6 1", "2024-01-01", "08:00", "10:00");
        let lookup = ReturnLookup {
            outbound,
            returns: vec![
                flight("W6 2", "2024-01-01", "10:30", "12:30"),
                flight("W6 3", "2024-01-02", "12:00", "14:00"),
            ],
            from_cache: false,
            complete: true,
        };
        let text = render_returns(&lookup, &Settings::default());
        assert!(text.contains("(1 found)"));
        assert!(text.contains("W6 3"));
        assert!(!text.contains("W6 2"));
        assert!(text.contains("Time until return: 1 days and 2 hours"));

        let none = ReturnLookup {
            returns: vec![flight("W6 2", "2024-01-01", "10:30", "12:30")],
            complete: false,
            ..lookup
        };
        let settings = Settings {
            return_window_days: 6,
            ..Settings::default()
        };
        let text = render_returns(&none, &settings);
        assert!(text.contains("No valid (>1h until return) flights found within 6 days of arrival."));
        assert!(text.contains("incomplete and were not cached"));
    }

    #[test]
    fn test_cache_list() {
        assert_eq!(
            render_cache_list(&[], Duration::hours(8)),
            "Searched flights will appear here.\n"
        );
        let searches = vec![CachedSearch {
            key: "LTN-2024-01-01".into(),
            origin: "LTN".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            captured_at: None,
            flight_count: 2,
        }];
        let text = render_cache_list(&searches, Duration::hours(8));
        assert!(text.starts_with("Last Results (8h)\n"));
        assert!(text.contains("LTN - Monday, Jan 1"));
    }
}
