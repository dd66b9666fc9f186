// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

static UTC_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:UTC|GMT)\s*(?:([+-])\s*(\d{1,2})(?::?(\d{2}))?)?$").unwrap()
});
static BLOCK_CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}):(\d{2})(?::\d{2})?$").unwrap());
static BLOCK_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(?:(\d{1,3})\s*h\w*)?\s*(?:(\d{1,4})\s*m\w*)?$").unwrap()
});

/// One outbound flight candidate as returned by the availability endpoint.
///
/// Field names follow the endpoint's JSON. Clock times are local to the
/// station and carry a separate offset label (e.g. `UTC+1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    #[serde(default, deserialize_with = "nullable")]
    pub departure_station: String,
    #[serde(default, deserialize_with = "nullable")]
    pub arrival_station: String,
    #[serde(default, deserialize_with = "nullable")]
    pub departure_station_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub arrival_station_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub flight_code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub departure_date: String,
    #[serde(default, deserialize_with = "nullable")]
    pub departure: String,
    #[serde(default, deserialize_with = "nullable")]
    pub departure_offset_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub arrival: String,
    #[serde(default, deserialize_with = "nullable")]
    pub arrival_offset_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub duration: String,
}

fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses `HH:MM` (optionally `HH:MM:SS`), ignoring a trailing ` (UTC+1)` label.
pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let clock = text.split(" (").next().unwrap_or("").trim();
    NaiveTime::parse_from_str(clock, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S"))
        .ok()
}

/// Parses an offset label such as `UTC+1`, `UTC-03:30` or plain `UTC`.
pub fn parse_offset(text: &str) -> Option<Duration> {
    let cap = UTC_OFFSET.captures(text.trim())?;
    let Some(sign) = cap.get(1) else {
        return Some(Duration::zero());
    };
    let hours: i64 = cap[2].parse().ok()?;
    let minutes: i64 = cap.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    let offset = Duration::hours(hours) + Duration::minutes(minutes);
    Some(if sign.as_str() == "-" { -offset } else { offset })
}

/// Parses a block time: `01:15`, `1h 15m` or `75m`.
pub fn parse_block_time(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (hours, minutes) = if let Some(cap) = BLOCK_CLOCK.captures(text) {
        (cap[1].parse::<i64>().ok()?, cap[2].parse::<i64>().ok()?)
    } else {
        let cap = BLOCK_UNITS.captures(text)?;
        if cap.get(1).is_none() && cap.get(2).is_none() {
            return None;
        }
        (
            cap.get(1).map_or(Ok(0), |m| m.as_str().parse()).ok()?,
            cap.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?,
        )
    };
    Some(Duration::minutes(hours * 60 + minutes))
}

impl Flight {
    /// Fills in station codes the payload left out.
    pub fn with_route(mut self, origin: &str, destination: &str) -> Self {
        if self.departure_station.is_empty() {
            self.departure_station = origin.to_uppercase();
        }
        if self.arrival_station.is_empty() {
            self.arrival_station = destination.to_uppercase();
        }
        self
    }

    /// Calendar date of departure; the endpoint sends either `YYYY-MM-DD` or a full timestamp.
    pub fn date(&self) -> Option<NaiveDate> {
        let day = self.departure_date.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn departs_at(&self) -> Option<NaiveDateTime> {
        Some(self.date()?.and_time(parse_clock(&self.departure)?))
    }

    /// Arrival instant in the destination's local clock time.
    ///
    /// The clocks of the two stations can be in different zones, so the
    /// landing day comes from departure plus block time, shifted by the
    /// offset labels. Without a block time the arrival is the first instant
    /// on the clock that is not before departure.
    pub fn arrives_at(&self) -> Option<NaiveDateTime> {
        let departs = self.departs_at()?;
        let arrival = parse_clock(&self.arrival)?;
        let shift = parse_offset(&self.arrival_offset_text)
            .zip(parse_offset(&self.departure_offset_text))
            .map_or(Duration::zero(), |(arr, dep)| arr - dep);
        let date = departs.date();

        let Some(block) = parse_block_time(&self.duration) else {
            let same_day = date.and_time(arrival);
            return if same_day < departs + shift {
                Some(date.succ_opt()?.and_time(arrival))
            } else {
                Some(same_day)
            };
        };

        let expected = departs + block + shift;
        [date.pred_opt(), Some(date), date.succ_opt()]
            .into_iter()
            .flatten()
            .map(|day| day.and_time(arrival))
            .min_by_key(|candidate| (*candidate - expected).num_seconds().abs())
    }

    /// `LTN (London Luton) to BVA (Paris Beauvais) - W6 1234`
    pub fn route_label(&self) -> String {
        format!(
            "{} ({}) to {} ({}) - {}",
            self.departure_station,
            self.departure_station_text,
            self.arrival_station,
            self.arrival_station_text,
            self.flight_code
        )
    }

    /// Origin and destination of the way back.
    pub fn reverse_route(&self) -> (String, String) {
        (self.arrival_station.clone(), self.departure_station.clone())
    }
}

/// Time between landing on `outbound` and taking off on `inbound`.
pub fn time_at_destination(outbound: &Flight, inbound: &Flight) -> Option<Duration> {
    Some(inbound.departs_at()? - outbound.arrives_at()?)
}

/// `2 days and 5 hours`
pub fn format_stay(stay: Duration) -> String {
    let days = stay.num_days();
    let hours = (stay - Duration::days(days)).num_hours();
    format!("{} days and {} hours", days, hours)
}
