// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::availability::AvailabilitySource;
use crate::credentials::Credentials;
use crate::flight::{time_at_destination, Flight};
use crate::progress::Progress;
use crate::{FlypassError, Result};
use chrono::{Duration, NaiveDate};
use log::{debug, error, info};

pub const DEFAULT_WINDOW_DAYS: u32 = 4;
pub const DEFAULT_MIN_LAYOVER_MINUTES: i64 = 60;

/// Return candidates plus the window dates that could not be checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnScan {
    pub flights: Vec<Flight>,
    pub failed_dates: Vec<NaiveDate>,
}

impl ReturnScan {
    /// True when every date in the window answered.
    pub fn is_complete(&self) -> bool {
        self.failed_dates.is_empty()
    }
}

/// Looks for ways back from an outbound flight's destination.
pub struct ReturnFinder<'a> {
    source: &'a dyn AvailabilitySource,
    credentials: &'a Credentials,
    window_days: u32,
    throttle: std::time::Duration,
}

impl<'a> ReturnFinder<'a> {
    pub fn new(source: &'a dyn AvailabilitySource, credentials: &'a Credentials) -> Self {
        Self {
            source,
            credentials,
            window_days: DEFAULT_WINDOW_DAYS,
            throttle: std::time::Duration::ZERO,
        }
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn throttle(mut self, throttle: std::time::Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Dates checked: `window_days` consecutive days from the arrival date.
    pub fn window_dates(&self, outbound: &Flight) -> Result<Vec<NaiveDate>> {
        let arrival = outbound.arrives_at().ok_or_else(|| {
            FlypassError::ExtractionFailed(format!(
                "outbound {} has no usable arrival time",
                outbound.flight_code
            ))
        })?;
        Ok(arrival
            .date()
            .iter_days()
            .take(self.window_days as usize)
            .collect())
    }

    /// Reverse-route flights departing strictly after the outbound lands.
    /// A failing date is logged, recorded and skipped.
    pub fn find(&self, outbound: &Flight, progress: &mut dyn Progress) -> Result<ReturnScan> {
        let dates = self.window_dates(outbound)?;
        let Some(arrival) = outbound.arrives_at() else {
            return Ok(ReturnScan::default());
        };
        let (origin, destination) = outbound.reverse_route();
        let total = dates.len();
        let mut scan = ReturnScan::default();

        progress.begin(total);
        progress.log(&format!(
            "Checking return flights: 0 of {} dates checked...",
            total
        ));
        for (index, date) in dates.iter().enumerate() {
            debug!("Checking return flights for {}", date);
            match self
                .source
                .check_route(self.credentials, &origin, &destination, *date)
            {
                Ok(flights) => {
                    let valid: Vec<Flight> = flights
                        .into_iter()
                        .filter(|f| f.departs_at().is_some_and(|dep| dep > arrival))
                        .collect();
                    debug!(
                        "Found {} valid return flights for {}",
                        valid.len(),
                        date
                    );
                    if !valid.is_empty() {
                        progress.flights_found(&valid);
                    }
                    scan.flights.extend(valid);
                }
                Err(e) => {
                    error!("Error checking return flight for {}: {}", date, e);
                    scan.failed_dates.push(*date);
                }
            }

            progress.step_done(index + 1, total);
            progress.log(&format!(
                "Checking return flights: {} of {} dates checked...",
                index + 1,
                total
            ));
            if index + 1 < total && !self.throttle.is_zero() {
                std::thread::sleep(self.throttle);
            }
        }
        progress.finish();

        info!(
            "Return search finished — outbound={} returns={} failed_dates={}",
            outbound.flight_code,
            scan.flights.len(),
            scan.failed_dates.len()
        );
        Ok(scan)
    }
}

/// Returns leaving at least `min` after the outbound lands.
pub fn with_min_layover(outbound: &Flight, returns: &[Flight], min: Duration) -> Vec<Flight> {
    returns
        .iter()
        .filter(|r| time_at_destination(outbound, r).is_some_and(|stay| stay >= min))
        .cloned()
        .collect()
}
