// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

#![allow(dead_code)]

use chrono::NaiveDate;
use flypass_core::availability::AvailabilitySource;
use flypass_core::credentials::{Credentials, HeaderSet};
use flypass_core::flight::Flight;
use flypass_core::page::{PageSnapshot, PageSource, TabControl};
use flypass_core::{FlypassError, Result};
use std::cell::RefCell;
use std::collections::HashMap;

pub const ENDPOINT: &str =
    "https://be.multipass.wizzair.com/w6/subscriptions/json/availability/abc-123";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials {
        endpoint: ENDPOINT.to_string(),
        headers: HeaderSet::fallback(),
    }
}

pub fn flight(origin: &str, dest: &str, code: &str, day: &str, dep: &str, arr: &str) -> Flight {
    Flight {
        departure_station: origin.into(),
        arrival_station: dest.into(),
        departure_station_text: format!("{} City", origin),
        arrival_station_text: format!("{} City", dest),
        flight_code: code.into(),
        departure_date: day.into(),
        departure: dep.into(),
        arrival: arr.into(),
        duration: "01:10".into(),
        ..Default::default()
    }
}

/// Canned reply for one route and date.
#[derive(Clone)]
pub enum Reply {
    Flights(Vec<Flight>),
    Status(u16),
}

/// Availability source answering from a table, recording every call.
#[derive(Default)]
pub struct FakeAvailability {
    replies: HashMap<(String, String, NaiveDate), Reply>,
    pub calls: RefCell<Vec<(String, String, NaiveDate)>>,
}

impl FakeAvailability {
    pub fn reply(mut self, origin: &str, dest: &str, on: NaiveDate, reply: Reply) -> Self {
        self.replies
            .insert((origin.to_string(), dest.to_string(), on), reply);
        self
    }

    pub fn destinations_called(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.1.clone()).collect()
    }
}

impl AvailabilitySource for FakeAvailability {
    fn check_route(
        &self,
        _credentials: &Credentials,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>> {
        let key = (origin.to_string(), destination.to_string(), date);
        self.calls.borrow_mut().push(key.clone());
        match self.replies.get(&key) {
            Some(Reply::Flights(flights)) => Ok(flights.clone()),
            Some(Reply::Status(429)) => Err(FlypassError::RateLimited),
            Some(Reply::Status(status)) => Err(FlypassError::Http { status: *status }),
            None => Ok(Vec::new()),
        }
    }
}

pub struct StaticPage(pub PageSnapshot);

impl PageSource for StaticPage {
    fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct RecordingTabs {
    pub opened: RefCell<Vec<String>>,
}

impl TabControl for RecordingTabs {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.borrow_mut().push(url.to_string());
        Ok(())
    }
}

/// Logged-in wallet page carrying the endpoint and a route table.
pub fn target_page(routes_json: &str) -> PageSnapshot {
    let markup = format!(
        r#"<html><body><script>window.__config = {{"availabilityUrl":"{}"}};</script>
<script>window.__state = {{"routes":{},"isOneWayFlightsOnly":false}};</script></body></html>"#,
        ENDPOINT.replace('/', "\\/"),
        routes_json
    );
    PageSnapshot {
        url: "https://multipass.wizzair.com/w6/subscriptions/spa/private-page/wallets".into(),
        markup,
    }
}

pub const LTN_ROUTES: &str = r#"[{"departureStation":{"id":"LTN"},"arrivalStations":[{"id":"BVA"},{"id":"WAW"},{"id":"BUD"}]},{"departureStation":{"id":"BVA"},"arrivalStations":[{"id":"LTN"}]}]"#;
