// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::credentials::Credentials;
use crate::flight::Flight;
use crate::{FlypassError, Result};
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of the one-way availability search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub flight_type: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub interval_subtype: Option<String>,
}

impl AvailabilityRequest {
    pub fn one_way(origin: &str, destination: &str, date: NaiveDate) -> Self {
        Self {
            flight_type: "OW".to_string(),
            origin: origin.to_uppercase(),
            destination: destination.to_uppercase(),
            departure: date.format("%Y-%m-%d").to_string(),
            arrival: String::new(),
            interval_subtype: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    #[serde(default)]
    flights_outbound: Option<Vec<Flight>>,
}

/// Anything that can answer "which flights go from A to B on this day".
pub trait AvailabilitySource {
    fn check_route(
        &self,
        credentials: &Credentials,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>>;
}

/// Maps an endpoint reply to flights or a typed failure.
pub fn interpret_response(
    status: u16,
    body: &str,
    origin: &str,
    destination: &str,
) -> Result<Vec<Flight>> {
    match status {
        429 => return Err(FlypassError::RateLimited),
        200..=299 => {}
        _ => return Err(FlypassError::Http { status }),
    }

    let parsed: AvailabilityResponse = serde_json::from_str(body).map_err(|e| {
        FlypassError::ExtractionFailed(format!("availability response not understood: {}", e))
    })?;

    Ok(parsed
        .flights_outbound
        .unwrap_or_default()
        .into_iter()
        .map(|f| f.with_route(origin, destination))
        .collect())
}

/// Posts availability searches to the session endpoint.
pub struct AvailabilityClient {
    client: reqwest::blocking::Client,
}

impl AvailabilityClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn header_map(credentials: &Credentials) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in credentials.headers.with_json_content_type().iter() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!("Skipping header that cannot be sent — name={}", name),
            }
        }
        map
    }
}

impl AvailabilitySource for AvailabilityClient {
    fn check_route(
        &self,
        credentials: &Credentials,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>> {
        let body = AvailabilityRequest::one_way(origin, destination, date);
        debug!(
            "Checking availability — origin={} destination={} date={}",
            body.origin, body.destination, body.departure
        );

        let response = self
            .client
            .post(&credentials.endpoint)
            .headers(Self::header_map(credentials))
            .json(&body)
            .send()?;
        let status = response.status().as_u16();
        let text = response.text()?;

        let flights = interpret_response(status, &text, origin, destination)?;
        debug!(
            "Availability answered — origin={} destination={} status={} flights={}",
            body.origin,
            body.destination,
            status,
            flights.len()
        );
        Ok(flights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = AvailabilityRequest::one_way(
            "ltn",
            "bva",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "flightType": "OW",
                "origin": "LTN",
                "destination": "BVA",
                "departure": "2024-01-05",
                "arrival": "",
                "intervalSubtype": null
            })
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            interpret_response(429, "", "LTN", "BVA"),
            Err(FlypassError::RateLimited)
        ));
        assert!(matches!(
            interpret_response(401, "{}", "LTN", "BVA"),
            Err(FlypassError::Http { status: 401 })
        ));
        assert!(matches!(
            interpret_response(200, "<html>login</html>", "LTN", "BVA"),
            Err(FlypassError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_outbound_flights_parsed() {
        let body = r#"{
            "flightsOutbound": [{
                "departureStationText": "London Luton",
                "arrivalStationText": "Paris Beauvais",
                "flightCode": "W6 1234",
                "departureDate": "2024-01-05T00:00:00",
                "departure": "08:15",
                "departureOffsetText": "UTC+0",
                "arrival": "10:30",
                "arrivalOffsetText": "UTC+1",
                "duration": "01:15"
            }],
            "flightsReturn": []
        }"#;
        let flights = interpret_response(200, body, "LTN", "BVA").unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].departure_station, "LTN");
        assert_eq!(flights[0].arrival_station, "BVA");

        assert!(interpret_response(200, "{}", "LTN", "BVA").unwrap().is_empty());
        assert!(interpret_response(200, r#"{"flightsOutbound":null}"#, "LTN", "BVA")
            .unwrap()
            .is_empty());
    }
}
