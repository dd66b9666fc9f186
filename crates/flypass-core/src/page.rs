// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::credentials::HeaderSet;
use crate::{host_matches, FlypassError, Result};
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

// Browsers stamp saved pages with `<!-- saved from url=(0077)https://… -->`.
static SAVED_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"saved from url=\(\d+\)(\S+?)\s*-->").unwrap());

/// The target page's address and markup at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub markup: String,
}

impl PageSnapshot {
    pub fn is_target(&self, host: &str) -> bool {
        is_target_page(&self.url, host)
    }
}

pub fn is_target_page(url: &str, host: &str) -> bool {
    host_matches(url, host)
}

/// Read access to the target page.
pub trait PageSource {
    fn snapshot(&self) -> Result<PageSnapshot>;
}

/// Opens pages in the user's browser.
pub trait TabControl {
    fn open(&self, url: &str) -> Result<()>;
}

/// A page saved to disk from the browser.
#[derive(Debug, Clone)]
pub struct FilePage {
    path: PathBuf,
    url: Option<String>,
}

impl FilePage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            url: None,
        }
    }

    /// Overrides the address detected from the saved markup.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for FilePage {
    fn snapshot(&self) -> Result<PageSnapshot> {
        let markup = std::fs::read_to_string(&self.path)?;
        let url = self
            .url
            .clone()
            .or_else(|| detect_page_url(&markup))
            .unwrap_or_else(|| format!("file://{}", self.path.display()));
        debug!(
            "Loaded saved page — path={} url={} bytes={}",
            self.path.display(),
            url,
            markup.len()
        );
        Ok(PageSnapshot { url, markup })
    }
}

/// Original address of a saved page: the browser's save stamp, then
/// `<link rel="canonical">`, then `og:url`.
pub fn detect_page_url(markup: &str) -> Option<String> {
    if let Some(cap) = SAVED_FROM.captures(markup) {
        return Some(cap[1].to_string());
    }

    let document = Html::parse_document(markup);
    let candidates = [
        ("link[rel=\"canonical\"]", "href"),
        ("meta[property=\"og:url\"]", "content"),
    ];
    for (css, attr) in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(value) = document
            .select(&selector)
            .find_map(|el| el.value().attr(attr))
            .filter(|v| !v.is_empty())
        {
            return Some(value.to_string());
        }
    }
    None
}

/// Fetches the live page, replaying captured session headers (cookies).
pub struct HttpPage {
    url: String,
    headers: HeaderSet,
    client: reqwest::blocking::Client,
}

impl HttpPage {
    pub fn new(url: &str, headers: HeaderSet, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            headers,
            client,
        })
    }
}

impl PageSource for HttpPage {
    fn snapshot(&self) -> Result<PageSnapshot> {
        info!("Fetching page — url={}", self.url);
        let mut request = self.client.get(&self.url);
        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            request = request.header(name, value);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FlypassError::Http {
                status: status.as_u16(),
            });
        }
        let url = response.url().to_string();
        let markup = response.text()?;
        debug!("Fetched page — url={} bytes={}", url, markup.len());
        Ok(PageSnapshot { url, markup })
    }
}
