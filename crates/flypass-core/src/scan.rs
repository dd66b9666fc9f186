// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::availability::AvailabilitySource;
use crate::credentials::Credentials;
use crate::flight::Flight;
use crate::progress::Progress;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::time::Duration;

/// A destination that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFailure {
    pub destination: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub flights: Vec<Flight>,
    pub failures: Vec<RouteFailure>,
    /// Destinations attempted, including failures and the rate-limited one.
    pub attempted: usize,
    pub rate_limited: bool,
}

impl ScanOutcome {
    /// True when every destination was tried.
    pub fn is_complete(&self, total: usize) -> bool {
        !self.rate_limited && self.attempted == total
    }
}

/// Checks one origin against a list of destinations, one request at a time.
pub struct RouteScanner<'a> {
    source: &'a dyn AvailabilitySource,
    credentials: &'a Credentials,
    throttle: Duration,
}

impl<'a> RouteScanner<'a> {
    pub fn new(
        source: &'a dyn AvailabilitySource,
        credentials: &'a Credentials,
        throttle: Duration,
    ) -> Self {
        Self {
            source,
            credentials,
            throttle,
        }
    }

    /// Per-destination failures are recorded and skipped. A rate-limit reply
    /// stops the scan; flights found before it are kept.
    pub fn scan(
        &self,
        origin: &str,
        date: NaiveDate,
        destinations: &[String],
        progress: &mut dyn Progress,
    ) -> ScanOutcome {
        let total = destinations.len();
        let mut outcome = ScanOutcome::default();
        progress.begin(total);

        for (index, destination) in destinations.iter().enumerate() {
            progress.log(&format!(
                "Checking {} to {}... {}/{}",
                origin, destination, index, total
            ));
            outcome.attempted += 1;

            match self
                .source
                .check_route(self.credentials, origin, destination, date)
            {
                Ok(flights) => {
                    if !flights.is_empty() {
                        progress.flights_found(&flights);
                    }
                    outcome.flights.extend(flights);
                }
                Err(e) if e.is_rate_limited() => {
                    warn!(
                        "Rate limited; stopping scan — origin={} destination={} checked={}/{}",
                        origin, destination, index, total
                    );
                    outcome.rate_limited = true;
                    outcome.failures.push(RouteFailure {
                        destination: destination.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
                Err(e) => {
                    error!(
                        "Error processing {} to {} on {}: {}",
                        origin, destination, date, e
                    );
                    outcome.failures.push(RouteFailure {
                        destination: destination.clone(),
                        error: e.to_string(),
                    });
                }
            }

            progress.step_done(index + 1, total);
            if index + 1 < total && !self.throttle.is_zero() {
                std::thread::sleep(self.throttle);
            }
        }

        progress.finish();
        info!(
            "Scan finished — origin={} date={} flights={} failures={} rate_limited={}",
            origin,
            date,
            outcome.flights.len(),
            outcome.failures.len(),
            outcome.rate_limited
        );
        outcome
    }
}
