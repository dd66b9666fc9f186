// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::availability::AvailabilitySource;
use crate::cache::{outbound_key, return_key, ResultCache};
use crate::credentials::{CredentialExtractor, Credentials, NetworkCapture};
use crate::destinations::{routes, DestinationResolver};
use crate::flight::Flight;
use crate::page::{PageSnapshot, PageSource, TabControl};
use crate::progress::Progress;
use crate::returns::ReturnFinder;
use crate::scan::{RouteFailure, RouteScanner};
use crate::settings::Settings;
use crate::store::KvStore;
use crate::{FlypassError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub origin: String,
    pub date: NaiveDate,
    pub with_returns: bool,
    /// Ignore and replace cached results.
    pub refresh: bool,
}

/// Return flights found for one outbound flight, before the layover filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnLookup {
    pub outbound: Flight,
    pub returns: Vec<Flight>,
    pub from_cache: bool,
    /// False when some return dates failed; such lookups are not cached.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub origin: String,
    pub date: NaiveDate,
    pub key: String,
    pub flights: Vec<Flight>,
    pub from_cache: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub destinations: usize,
    pub failures: Vec<RouteFailure>,
    pub rate_limited: bool,
    pub returns: Vec<ReturnLookup>,
}

/// Page snapshot and credentials for one resolution cycle.
#[derive(Debug, Clone)]
pub struct Session {
    pub snapshot: PageSnapshot,
    pub credentials: Credentials,
}

/// Drives a full search: cache, page, destinations, availability, returns.
pub struct FlightSearch<'a, S> {
    settings: &'a Settings,
    cache: &'a mut ResultCache<S>,
    source: &'a dyn AvailabilitySource,
    tabs: &'a dyn TabControl,
    page: Option<&'a dyn PageSource>,
    capture: Option<&'a NetworkCapture>,
    resolver: Option<Box<dyn DestinationResolver + 'a>>,
}

impl<'a, S: KvStore> FlightSearch<'a, S> {
    pub fn new(
        settings: &'a Settings,
        cache: &'a mut ResultCache<S>,
        source: &'a dyn AvailabilitySource,
        tabs: &'a dyn TabControl,
    ) -> Self {
        Self {
            settings,
            cache,
            source,
            tabs,
            page: None,
            capture: None,
            resolver: None,
        }
    }

    pub fn with_page(mut self, page: &'a dyn PageSource) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_capture(mut self, capture: &'a NetworkCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Replaces the embedded route table as the source of destinations.
    pub fn with_resolver(mut self, resolver: Box<dyn DestinationResolver + 'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn open_target_page(&self) {
        if let Err(e) = self.tabs.open(&self.settings.page_url) {
            warn!(
                "Could not open the multipass page — url={} error={}",
                self.settings.page_url, e
            );
        }
    }

    /// Snapshot of the target page plus the credentials found on it. When
    /// there is no page, or it is some other site, the target page is opened
    /// for the user and the search stops.
    pub fn open_session(&self) -> Result<Session> {
        let Some(page) = self.page else {
            self.open_target_page();
            return Err(FlypassError::NotOnTargetPage(
                "no page snapshot supplied".to_string(),
            ));
        };

        let snapshot = page.snapshot()?;
        if !snapshot.is_target(&self.settings.host) {
            self.open_target_page();
            return Err(FlypassError::NotOnTargetPage(snapshot.url));
        }

        let credentials =
            CredentialExtractor::new(&self.settings.host, self.settings.credential_strategy)
                .resolve(self.capture, &snapshot.markup)?;
        Ok(Session {
            snapshot,
            credentials,
        })
    }

    pub fn destinations(&mut self, session: &Session, origin: &str) -> Result<Vec<String>> {
        match self.resolver.as_mut() {
            Some(resolver) => resolver.destinations(origin),
            None => routes::extract_destinations(&session.snapshot.markup, origin),
        }
    }

    pub fn run(&mut self, request: &SearchRequest, progress: &mut dyn Progress) -> Result<SearchReport> {
        let origin = normalize_origin(&request.origin)?;
        if let Err(e) = self.cache.set_last_airport(&origin) {
            warn!("Could not remember last airport: {}", e);
        }

        let key = outbound_key(&origin, request.date);
        if request.refresh {
            self.cache.clear(&key)?;
        } else if let Some(entry) = self.cache.entry(&key) {
            info!("Using cached results — key={}", key);
            let returns = self.cached_returns(&key, &entry.results);
            return Ok(SearchReport {
                origin,
                date: request.date,
                key,
                destinations: 0,
                cached_at: entry.captured_at(),
                flights: entry.results,
                from_cache: true,
                failures: Vec::new(),
                rate_limited: false,
                returns,
            });
        }

        let session = self.open_session()?;
        let destinations = self.destinations(&session, &origin)?;
        info!(
            "Fetched destinations — origin={} count={}",
            origin,
            destinations.len()
        );

        let outcome = RouteScanner::new(self.source, &session.credentials, self.settings.throttle())
            .scan(&origin, request.date, &destinations, progress);

        if outcome.rate_limited {
            warn!("Search stopped due to rate limiting; partial results are not cached");
        } else if !outcome.flights.is_empty() && outcome.is_complete(destinations.len()) {
            if let Err(e) = self.cache.set(&key, &outcome.flights) {
                warn!("Could not cache results — key={} error={}", key, e);
            }
        }

        let mut returns = Vec::new();
        if request.with_returns && !outcome.rate_limited {
            for flight in &outcome.flights {
                match self.find_returns(&key, &session.credentials, flight, request.refresh, progress)
                {
                    Ok(lookup) => returns.push(lookup),
                    Err(e) => error!(
                        "Skipping return search — flight={} error={}",
                        flight.flight_code, e
                    ),
                }
            }
        }

        Ok(SearchReport {
            origin,
            date: request.date,
            key,
            flights: outcome.flights,
            from_cache: false,
            cached_at: None,
            destinations: destinations.len(),
            failures: outcome.failures,
            rate_limited: outcome.rate_limited,
            returns,
        })
    }

    /// Returns for one outbound flight, from cache when still valid.
    pub fn find_returns(
        &mut self,
        outbound_key: &str,
        credentials: &Credentials,
        outbound: &Flight,
        refresh: bool,
        progress: &mut dyn Progress,
    ) -> Result<ReturnLookup> {
        let key = return_key(outbound_key, &outbound.route_label());
        if refresh {
            self.cache.clear(&key)?;
        } else if let Some(returns) = self.cache.get(&key) {
            return Ok(ReturnLookup {
                outbound: outbound.clone(),
                returns,
                from_cache: true,
                complete: true,
            });
        }

        let scan = ReturnFinder::new(self.source, credentials)
            .window_days(self.settings.return_window_days)
            .throttle(self.settings.throttle())
            .find(outbound, progress)?;
        let complete = scan.is_complete();
        if !complete {
            warn!(
                "Some return dates failed; not caching — key={} failed_dates={}",
                key,
                scan.failed_dates.len()
            );
        } else if let Err(e) = self.cache.set(&key, &scan.flights) {
            warn!("Could not cache return flights — key={} error={}", key, e);
        }
        Ok(ReturnLookup {
            outbound: outbound.clone(),
            returns: scan.flights,
            from_cache: false,
            complete,
        })
    }

    /// Cached return lookups for the given outbound flights, skipping any not cached.
    pub fn cached_returns(&mut self, outbound_key: &str, flights: &[Flight]) -> Vec<ReturnLookup> {
        flights
            .iter()
            .filter_map(|flight| {
                let key = return_key(outbound_key, &flight.route_label());
                self.cache.get(&key).map(|returns| ReturnLookup {
                    outbound: flight.clone(),
                    returns,
                    from_cache: true,
                    complete: true,
                })
            })
            .collect()
    }

    /// Return search for a flight from an earlier, still cached, outbound search.
    pub fn returns_for(
        &mut self,
        origin: &str,
        date: NaiveDate,
        flight_code: &str,
        refresh: bool,
        progress: &mut dyn Progress,
    ) -> Result<ReturnLookup> {
        let origin = normalize_origin(origin)?;
        let key = outbound_key(&origin, date);
        let flights = self.cache.get(&key).ok_or_else(|| {
            FlypassError::InvalidInput(format!(
                "No cached results for {}; run a search first.",
                key
            ))
        })?;

        let wanted = compact(flight_code);
        let outbound = flights
            .into_iter()
            .find(|f| compact(&f.flight_code) == wanted)
            .ok_or_else(|| {
                FlypassError::InvalidInput(format!(
                    "Flight {} is not among the results for {}.",
                    flight_code, key
                ))
            })?;

        let session = self.open_session()?;
        self.find_returns(&key, &session.credentials, &outbound, refresh, progress)
    }
}

fn compact(code: &str) -> String {
    code.split_whitespace().collect::<String>().to_uppercase()
}

fn normalize_origin(origin: &str) -> Result<String> {
    let origin = origin.trim().to_uppercase();
    if origin.is_empty() {
        return Err(FlypassError::InvalidInput(
            "Please enter a departure airport code.".to_string(),
        ));
    }
    if !origin.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FlypassError::InvalidInput(format!(
            "'{}' is not an airport code.",
            origin
        )));
    }
    Ok(origin)
}
