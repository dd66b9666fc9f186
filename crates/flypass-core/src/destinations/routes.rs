// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Route table embedded in the page's inline scripts.
//!
//! Two embeddings are seen in the wild:
//! * `"routes":[…],"isOneWayFlightsOnly"` inside a JSON state blob;
//! * `routes: JSON.parse('…')` where the table is a JS string literal.

use crate::{FlypassError, Result};
use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::LazyLock;

static INLINE_ROUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"routes"\s*:\s*(\[.*?\])\s*,\s*"isOneWayFlightsOnly""#).unwrap()
});
static PARSED_ROUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)routes["']?\s*[:=]\s*JSON\.parse\(\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*\)"#,
    )
    .unwrap()
});

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StationRef {
    Code(String),
    Object { id: String },
}

impl StationRef {
    fn code(&self) -> &str {
        match self {
            StationRef::Code(code) => code,
            StationRef::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteEntry {
    departure_station: StationRef,
    #[serde(default)]
    arrival_stations: Vec<StationRef>,
}

/// Decoded route table: which destinations each origin serves.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Finds and decodes the table in page markup or a bare script fragment.
    pub fn from_markup(markup: &str) -> Result<Self> {
        let mut sources = inline_scripts(markup);
        sources.push(markup.to_string());

        for source in &sources {
            if let Some(json) = find_embedded(source)? {
                let entries: Vec<RouteEntry> = serde_json::from_str(&json).map_err(|e| {
                    FlypassError::ExtractionFailed(format!("malformed route table: {}", e))
                })?;
                debug!("Decoded route table — routes={}", entries.len());
                return Ok(Self { entries });
            }
        }

        Err(FlypassError::ExtractionFailed(
            "no route table found in page scripts".to_string(),
        ))
    }

    /// Destinations served from `origin`, deduplicated in table order.
    pub fn destinations_from(&self, origin: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.departure_station.code().eq_ignore_ascii_case(origin))
        {
            for station in &entry.arrival_stations {
                let code = station.code().trim().to_uppercase();
                if !code.is_empty() && !out.contains(&code) {
                    out.push(code);
                }
            }
        }
        out
    }

    pub fn origins(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.entries {
            let code = entry.departure_station.code().to_uppercase();
            if !out.contains(&code) {
                out.push(code);
            }
        }
        out
    }

    /// Whether `origin` appears as a departure station at all.
    pub fn serves(&self, origin: &str) -> bool {
        self.origins().iter().any(|o| o.eq_ignore_ascii_case(origin.trim()))
    }
}

/// Destinations from `origin` in the table embedded in `markup`. An origin
/// missing from the table yields an empty list.
pub fn extract_destinations(markup: &str, origin: &str) -> Result<Vec<String>> {
    let table = RouteTable::from_markup(markup)?;
    if !table.serves(origin) {
        warn!(
            "Origin not in route table — origin={} known_origins={}",
            origin,
            table.origins().join(",")
        );
        return Ok(Vec::new());
    }
    Ok(table.destinations_from(origin))
}

fn inline_scripts(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("script:not([src])") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .filter(|text| text.contains("routes"))
        .collect()
}

/// The raw JSON text of the table, if this source embeds one.
fn find_embedded(source: &str) -> Result<Option<String>> {
    if let Some(cap) = INLINE_ROUTES.captures(source) {
        return Ok(Some(cap[1].to_string()));
    }
    if let Some(cap) = PARSED_ROUTES.captures(source) {
        let literal = cap.get(1).or_else(|| cap.get(2)).map_or("", |m| m.as_str());
        return unescape_js(literal).map(Some);
    }
    Ok(None)
}

/// Decodes the body of a JS string literal.
fn unescape_js(literal: &str) -> Result<String> {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let code = hex_escape(&mut chars, 2)?;
                out.push(to_char(code)?);
            }
            Some('u') => {
                let code = hex_escape(&mut chars, 4)?;
                if (0xD800..0xDC00).contains(&code) {
                    // High surrogate; the low half must follow as another \u escape.
                    let low = match (chars.next(), chars.next()) {
                        (Some('\\'), Some('u')) => hex_escape(&mut chars, 4)?,
                        _ => return Err(lone_surrogate(code)),
                    };
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(lone_surrogate(code));
                    }
                    out.push(to_char(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00))?);
                } else {
                    out.push(to_char(code)?);
                }
            }
            Some(other) => out.push(other),
            None => {
                return Err(FlypassError::ExtractionFailed(
                    "route literal ends in a dangling escape".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, len: usize) -> Result<u32> {
    let hex: String = chars.by_ref().take(len).collect();
    if hex.len() != len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FlypassError::ExtractionFailed(format!(
            "bad escape sequence '{}'",
            hex
        )));
    }
    u32::from_str_radix(&hex, 16)
        .map_err(|_| FlypassError::ExtractionFailed(format!("bad escape sequence '{}'", hex)))
}

fn to_char(code: u32) -> Result<char> {
    char::from_u32(code).ok_or_else(|| lone_surrogate(code))
}

fn lone_surrogate(code: u32) -> FlypassError {
    FlypassError::ExtractionFailed(format!("unpaired surrogate \\u{:04X}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_state_fragment() {
        let fragment = r#"{"routes":[{"departureStation":{"id":"LTN"},"arrivalStations":[{"id":"BVA"}]}],"isOneWayFlightsOnly":false}"#;
        assert_eq!(extract_destinations(fragment, "LTN").unwrap(), vec!["BVA"]);
        assert!(extract_destinations(fragment, "WAW").unwrap().is_empty());
    }

    #[test]
    fn test_json_parse_literal_in_script() {
        let page = r#"<html><head>
            <script src="/app.js"></script>
            <script>
              window.CVO = { routes: JSON.parse('[{\"departureStation\":\"LTN\",\"arrivalStations\":[\"BUD\",{\"id\":\"WAW\"},\"BUD\"]},{\"departureStation\":\"BUD\",\"arrivalStations\":[\"LTN\"]}]') };
            </script>
        </head><body></body></html>"#;
        let table = RouteTable::from_markup(page).unwrap();
        assert_eq!(table.destinations_from("ltn"), vec!["BUD", "WAW"]);
        assert_eq!(table.origins(), vec!["LTN", "BUD"]);
    }

    #[test]
    fn test_truncated_table_is_an_error() {
        let truncated = r#"<script>{"routes":[{"departureStation":{"id":"LTN"},"arrivalStations":[{"id":"BVA"}],"isOneWayFlightsOnly":true}</script>"#;
        let err = extract_destinations(truncated, "LTN").unwrap_err();
        assert!(matches!(err, FlypassError::ExtractionFailed(msg) if msg.contains("malformed")));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let err = extract_destinations("<html><script>var x = 1;</script></html>", "LTN").unwrap_err();
        assert!(matches!(err, FlypassError::ExtractionFailed(_)));
    }

    #[test]
    fn test_js_unescape() {
        assert_eq!(unescape_js(r#"a\'b\"cA\\"#).unwrap(), "a'b\"cA\\");
        assert!(unescape_js("oops\\").is_err());
    }

    #[test]
    fn test_js_unescape_hex_and_surrogates() {
        assert_eq!(unescape_js(r"\x41\x42C").unwrap(), "ABC");
        assert_eq!(unescape_js(r"Pécs \u00e9 \uD83D\uDE00").unwrap(), "Pécs é \u{1F600}");
        assert!(unescape_js(r"\uD83D").is_err());
        assert!(unescape_js(r"\uD83Dx").is_err());
        assert!(unescape_js(r"\uDE00").is_err());
        assert!(unescape_js(r"\x4").is_err());
        assert!(unescape_js(r"\xZZ").is_err());
    }

    #[test]
    fn test_unknown_origin_is_empty() {
        let fragment = r#"{"routes":[{"departureStation":"LTN","arrivalStations":["BVA"]},{"departureStation":"BVA","arrivalStations":[]}],"isOneWayFlightsOnly":false}"#;
        let table = RouteTable::from_markup(fragment).unwrap();
        assert!(table.serves("ltn"));
        assert!(table.serves("BVA"));
        assert!(!table.serves("WAW"));
        assert!(extract_destinations(fragment, "WAW").unwrap().is_empty());
        assert!(extract_destinations(fragment, "BVA").unwrap().is_empty());
    }
}
