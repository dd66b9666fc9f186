// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Destination lookup by driving the search form's two autocomplete fields.
//!
//! Each step waits for the page to reach the state the next step needs
//! (suggestions rendered, suggestion accepted) instead of sleeping.

use super::DestinationResolver;
use crate::{FlypassError, Result};
use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

pub const ORIGIN_INPUT: &str = r#"input[aria-owns="autocomplete-result-list-1"]"#;
pub const DESTINATION_INPUT: &str = r#"input[aria-owns="autocomplete-result-list-2"]"#;
pub const ORIGIN_LIST: &str = "ul#autocomplete-result-list-1";
pub const DESTINATION_LIST: &str = "ul#autocomplete-result-list-2";
pub const CLEAR_BUTTON: &str = "button.CvoClose";

static STATION_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([A-Z]{3})\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    Enter,
}

/// Live DOM access on the target page, addressed by CSS selectors.
pub trait PageDriver {
    fn exists(&mut self, selector: &str) -> bool;
    /// Clicks the first `child` inside the parent of `selector`; false if there is none.
    fn click_in_parent(&mut self, selector: &str, child: &str) -> Result<bool>;
    fn focus(&mut self, selector: &str) -> Result<()>;
    fn click(&mut self, selector: &str) -> Result<()>;
    /// Sets the field's value and fires a bubbling `input` event.
    fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;
    /// Fires a bubbling `input` event without changing the value.
    fn dispatch_input(&mut self, selector: &str) -> Result<()>;
    fn key_down(&mut self, selector: &str, key: Key) -> Result<()>;
    fn inner_html(&mut self, selector: &str) -> Option<String>;
}

/// Bounds for readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll: Duration::from_millis(100),
        }
    }
}

/// Polls `ready` until it holds or `readiness.timeout` passes.
pub fn wait_until<F>(readiness: Readiness, what: &str, mut ready: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    loop {
        if ready() {
            debug!(
                "Page ready — waited_for={} elapsed_ms={}",
                what,
                started.elapsed().as_millis()
            );
            return Ok(());
        }
        if started.elapsed() >= readiness.timeout {
            return Err(FlypassError::ExtractionFailed(format!(
                "timed out after {} ms waiting for {}",
                readiness.timeout.as_millis(),
                what
            )));
        }
        std::thread::sleep(readiness.poll);
    }
}

/// Text of each `<li>` in a suggestion list, reduced to its `(XXX)` code
/// where one is present.
pub fn suggestion_codes(list_html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(list_html);
    let Ok(selector) = Selector::parse("li") else {
        return Vec::new();
    };
    fragment
        .select(&selector)
        .map(|li| {
            let text = li.text().collect::<String>();
            let text = text.trim();
            STATION_CODE
                .captures(text)
                .map(|cap| cap[1].to_string())
                .unwrap_or_else(|| text.to_string())
        })
        .filter(|code| !code.is_empty())
        .collect()
}

fn has_items<D: PageDriver + ?Sized>(driver: &mut D, list: &str) -> bool {
    driver
        .inner_html(list)
        .is_some_and(|html| !suggestion_codes(&html).is_empty())
}

pub struct AutocompleteResolver<D> {
    driver: D,
    readiness: Readiness,
}

impl<D: PageDriver> AutocompleteResolver<D> {
    pub fn new(driver: D, readiness: Readiness) -> Self {
        Self { driver, readiness }
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

impl<D: PageDriver> DestinationResolver for AutocompleteResolver<D> {
    fn destinations(&mut self, origin: &str) -> Result<Vec<String>> {
        let driver = &mut self.driver;
        let origin = origin.trim().to_uppercase();

        if !driver.exists(ORIGIN_INPUT) || !driver.exists(DESTINATION_INPUT) {
            return Err(FlypassError::ElementsNotFound(
                "Input fields not found".to_string(),
            ));
        }

        for (index, input) in [ORIGIN_INPUT, DESTINATION_INPUT].iter().enumerate() {
            if !driver.click_in_parent(input, CLEAR_BUTTON)? {
                warn!("Clear button not found for input field {}", index + 1);
            }
        }

        driver.focus(ORIGIN_INPUT)?;
        driver.type_text(ORIGIN_INPUT, &origin)?;
        wait_until(self.readiness, "origin suggestions", || {
            has_items(driver, ORIGIN_LIST)
        })?;

        driver.key_down(ORIGIN_INPUT, Key::ArrowDown)?;
        driver.key_down(ORIGIN_INPUT, Key::Enter)?;
        wait_until(self.readiness, "origin selection", || {
            !has_items(driver, ORIGIN_LIST)
        })?;

        driver.focus(DESTINATION_INPUT)?;
        driver.click(DESTINATION_INPUT)?;
        driver.dispatch_input(DESTINATION_INPUT)?;

        if !driver.exists(DESTINATION_LIST) {
            return Err(FlypassError::ElementsNotFound(
                "Destination list not found".to_string(),
            ));
        }
        wait_until(self.readiness, "destination suggestions", || {
            has_items(driver, DESTINATION_LIST)
        })?;

        let html = driver.inner_html(DESTINATION_LIST).unwrap_or_default();
        let codes = suggestion_codes(&html);
        debug!(
            "Read destination suggestions — origin={} destinations={}",
            origin,
            codes.len()
        );
        Ok(codes)
    }
}
