// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Recovers the headers and the per-session availability endpoint that the
//! multipass page uses for its own requests.
//!
//! Two sources are understood:
//! * a network capture (HAR export) of the page session, whose requests to
//!   the target host carry the authenticated headers;
//! * resource-timing metadata, where the site echoes request headers back as
//!   `Server-Timing` entries named `hdr-<header-name>` with the value in `desc`.

use crate::{host_matches, FlypassError, Result};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SERVER_TIMING_HEADER_PREFIX: &str = "hdr-";

/// Headers never replayed from a capture.
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "accept-encoding",
    "transfer-encoding",
];

/// Header name → value, names compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: BTreeMap<String, String>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The degraded set used when nothing could be captured. Requests sent
    /// with it will most likely be rejected by the endpoint.
    pub fn fallback() -> Self {
        let mut set = Self::new();
        set.insert("Content-Type", "application/json");
        set
    }

    /// Inserts, replacing any existing header of the same name regardless of case.
    pub fn insert(&mut self, name: &str, value: &str) {
        let existing = self
            .headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned();
        if let Some(existing) = existing {
            self.headers.remove(&existing);
        }
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Copy with `Content-Type: application/json` forced.
    pub fn with_json_content_type(&self) -> Self {
        let mut set = self.clone();
        set.insert("Content-Type", "application/json");
        set
    }
}

/// Everything needed to call the availability endpoint for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub headers: HeaderSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStrategy {
    /// Observed requests first, server timing second.
    #[default]
    Auto,
    Requests,
    ServerTiming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerTimingEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One completed resource load with its server-timing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceTiming {
    pub name: String,
    #[serde(rename = "serverTiming", default)]
    pub server_timing: Vec<ServerTimingEntry>,
}

/// Requests and resource timings recorded while the page was open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCapture {
    pub requests: Vec<ObservedRequest>,
    pub timings: Vec<ResourceTiming>,
}

#[derive(Deserialize)]
struct NameValue {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct HarRequest {
    #[serde(default)]
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<NameValue>,
}

#[derive(Deserialize)]
struct HarResponse {
    #[serde(default)]
    headers: Vec<NameValue>,
}

#[derive(Deserialize)]
struct HarEntry {
    request: HarRequest,
    #[serde(default)]
    response: Option<HarResponse>,
}

#[derive(Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Deserialize)]
struct Har {
    log: HarLog,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureFile {
    Har(Har),
    Timings(Vec<ResourceTiming>),
}

impl NetworkCapture {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Accepts a HAR document or a resource-timing array.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CaptureFile = serde_json::from_str(content).map_err(|e| {
            FlypassError::ExtractionFailed(format!("unrecognised capture file: {}", e))
        })?;

        let capture = match file {
            CaptureFile::Timings(timings) => NetworkCapture {
                requests: Vec::new(),
                timings,
            },
            CaptureFile::Har(har) => {
                let mut capture = NetworkCapture::default();
                for entry in har.log.entries {
                    let server_timing: Vec<ServerTimingEntry> = entry
                        .response
                        .iter()
                        .flat_map(|r| r.headers.iter())
                        .filter(|h| h.name.eq_ignore_ascii_case("server-timing"))
                        .flat_map(|h| parse_server_timing(&h.value))
                        .collect();
                    if !server_timing.is_empty() {
                        capture.timings.push(ResourceTiming {
                            name: entry.request.url.clone(),
                            server_timing,
                        });
                    }
                    capture.requests.push(ObservedRequest {
                        method: entry.request.method,
                        url: entry.request.url,
                        headers: entry
                            .request
                            .headers
                            .into_iter()
                            .map(|h| (h.name, h.value))
                            .collect(),
                    });
                }
                capture
            }
        };

        debug!(
            "Loaded network capture — requests={} timings={}",
            capture.requests.len(),
            capture.timings.len()
        );
        Ok(capture)
    }

    fn latest_request_to(&self, host: &str) -> Option<&ObservedRequest> {
        self.requests
            .iter()
            .rev()
            .filter(|r| host_matches(&r.url, host))
            .find(|r| r.url.contains("/availability/"))
            .or_else(|| {
                self.requests
                    .iter()
                    .rev()
                    .find(|r| host_matches(&r.url, host))
            })
    }
}

/// Splits a `Server-Timing` header value into its metrics.
///
/// `hdr-authorization;desc="Bearer a,b", cache;dur=2` yields two entries;
/// commas inside quoted values do not split.
pub fn parse_server_timing(value: &str) -> Vec<ServerTimingEntry> {
    let mut metrics = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => metrics.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    metrics.push(current);

    metrics
        .iter()
        .filter_map(|metric| {
            let mut parts = split_params(metric).into_iter();
            let name = parts.next()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let description = parts
                .filter_map(|p| {
                    let (k, v) = p.split_once('=')?;
                    k.trim()
                        .eq_ignore_ascii_case("desc")
                        .then(|| unquote(v.trim()))
                })
                .next()
                .unwrap_or_default();
            Some(ServerTimingEntry { name, description })
        })
        .collect()
}

fn split_params(metric: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in metric.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn is_replayable(name: &str) -> bool {
    !name.starts_with(':') && !SKIPPED_HEADERS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Headers of the most recent request the page sent to `host`.
pub fn headers_from_requests(capture: &NetworkCapture, host: &str) -> Result<HeaderSet> {
    let request = capture.latest_request_to(host).ok_or_else(|| {
        FlypassError::CredentialMissing(format!("no captured request to {}", host))
    })?;

    let mut headers = HeaderSet::new();
    for (name, value) in &request.headers {
        if is_replayable(name) {
            headers.insert(name, value);
        }
    }
    debug!(
        "Captured request headers — url={} headers={}",
        request.url,
        headers.len()
    );
    Ok(headers)
}

/// Headers echoed as `hdr-*` server-timing entries on loads from `host`.
pub fn headers_from_server_timing(capture: &NetworkCapture, host: &str) -> Result<HeaderSet> {
    let mut headers = HeaderSet::new();
    for timing in capture.timings.iter().filter(|t| host_matches(&t.name, host)) {
        for entry in &timing.server_timing {
            let Some(name) = entry
                .name
                .strip_prefix(SERVER_TIMING_HEADER_PREFIX)
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            if is_replayable(name) {
                headers.insert(name, &entry.description);
            }
        }
    }

    if headers.is_empty() {
        return Err(FlypassError::CredentialMissing(format!(
            "no server-timing header entries for {}",
            host
        )));
    }
    debug!("Recovered server-timing headers — headers={}", headers.len());
    Ok(headers)
}

/// URL of the availability request seen in the capture, if any.
pub fn endpoint_from_capture(capture: &NetworkCapture, host: &str) -> Option<String> {
    capture
        .requests
        .iter()
        .rev()
        .find(|r| host_matches(&r.url, host) && r.url.contains("/availability/"))
        .map(|r| r.url.clone())
}

/// First `https://<host>/…/availability/<session-id>` URL in the page markup.
/// JSON-escaped slashes (`https:\/\/…`) are accepted.
pub fn endpoint_from_markup(markup: &str, host: &str) -> Option<String> {
    let pattern = format!(
        r#"https://(?:[A-Za-z0-9-]+\.)*{}/[^\s"'<>]*?/availability/[A-Za-z0-9_-]+"#,
        regex::escape(host)
    );
    let re = Regex::new(&pattern).ok()?;
    let unescaped = markup.replace("\\/", "/");
    re.find(&unescaped).map(|m| m.as_str().to_string())
}

/// Resolves credentials for one session using the configured strategy.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    host: String,
    strategy: CredentialStrategy,
}

impl CredentialExtractor {
    pub fn new(host: &str, strategy: CredentialStrategy) -> Self {
        Self {
            host: host.to_string(),
            strategy,
        }
    }

    pub fn extract_headers(&self, capture: &NetworkCapture) -> Result<HeaderSet> {
        match self.strategy {
            CredentialStrategy::Requests => headers_from_requests(capture, &self.host),
            CredentialStrategy::ServerTiming => headers_from_server_timing(capture, &self.host),
            CredentialStrategy::Auto => headers_from_requests(capture, &self.host)
                .or_else(|_| headers_from_server_timing(capture, &self.host)),
        }
    }

    /// Endpoint plus headers. Missing headers degrade to [`HeaderSet::fallback`];
    /// a missing endpoint is an error.
    pub fn resolve(&self, capture: Option<&NetworkCapture>, markup: &str) -> Result<Credentials> {
        let headers = match capture {
            Some(capture) => self.extract_headers(capture),
            None => Err(FlypassError::CredentialMissing(
                "no network capture supplied".to_string(),
            )),
        };
        let headers = headers.unwrap_or_else(|e| {
            warn!("{}; falling back to default headers, requests will likely be rejected", e);
            HeaderSet::fallback()
        });

        let endpoint = capture
            .and_then(|c| endpoint_from_capture(c, &self.host))
            .or_else(|| endpoint_from_markup(markup, &self.host))
            .ok_or_else(|| {
                FlypassError::ExtractionFailed(
                    "availability endpoint URL not found on the page".to_string(),
                )
            })?;

        info!(
            "Resolved session credentials — endpoint={} headers={}",
            endpoint,
            headers.len()
        );
        Ok(Credentials { endpoint, headers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_HOST;

    const HAR: &str = r#"{
        "log": {
            "entries": [
                {
                    "request": {
                        "method": "GET",
                        "url": "https://multipass.wizzair.com/w6/subscriptions/spa/private-page/wallets",
                        "headers": [{"name": "Cookie", "value": "old"}]
                    },
                    "response": {"status": 200, "headers": []}
                },
                {
                    "request": {
                        "method": "POST",
                        "url": "https://multipass.wizzair.com/w6/subscriptions/json/availability/abc-123",
                        "headers": [
                            {"name": ":authority", "value": "multipass.wizzair.com"},
                            {"name": "Cookie", "value": "session=1"},
                            {"name": "X-RequestVerificationToken", "value": "tok"},
                            {"name": "Content-Length", "value": "99"}
                        ]
                    },
                    "response": {
                        "status": 200,
                        "headers": [{"name": "Server-Timing", "value": "hdr-authorization;desc=\"Bearer x\""}]
                    }
                },
                {
                    "request": {"method": "GET", "url": "https://cdn.example.com/app.js", "headers": []}
                }
            ]
        }
    }"#;

    #[test]
    fn test_requests_strategy_prefers_availability_call() {
        let capture = NetworkCapture::from_json(HAR).unwrap();
        let headers = headers_from_requests(&capture, DEFAULT_HOST).unwrap();

        assert_eq!(headers.get("cookie"), Some("session=1"));
        assert_eq!(headers.get("x-requestverificationtoken"), Some("tok"));
        assert!(headers.get(":authority").is_none());
        assert!(headers.get("content-length").is_none());
        assert_eq!(
            endpoint_from_capture(&capture, DEFAULT_HOST).as_deref(),
            Some("https://multipass.wizzair.com/w6/subscriptions/json/availability/abc-123")
        );
    }

    #[test]
    fn test_server_timing_from_resource_export() {
        let json = r#"[
            {"name": "https://multipass.wizzair.com/w6/app", "serverTiming": [
                {"name": "hdr-Authorization", "description": "Bearer abc"},
                {"name": "hdr-X-Session", "description": "s1"},
                {"name": "db", "description": "12ms"}
            ]},
            {"name": "https://tracker.example.com/p", "serverTiming": [
                {"name": "hdr-Cookie", "description": "foreign"}
            ]}
        ]"#;
        let capture = NetworkCapture::from_json(json).unwrap();
        assert!(headers_from_requests(&capture, DEFAULT_HOST).is_err());

        let headers = headers_from_server_timing(&capture, DEFAULT_HOST).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("authorization"), Some("Bearer abc"));
        assert!(headers.get("cookie").is_none());
    }

    #[test]
    fn test_server_timing_header_parsing() {
        let entries =
            parse_server_timing(r#"hdr-authorization;desc="Bearer a,b", cache;dur=2.5, hdr-x;desc=plain"#);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "hdr-authorization");
        assert_eq!(entries[0].description, "Bearer a,b");
        assert_eq!(entries[1].name, "cache");
        assert_eq!(entries[1].description, "");
        assert_eq!(entries[2].description, "plain");
    }

    #[test]
    fn test_auto_strategy_and_fallback() {
        let capture = NetworkCapture::from_json(HAR).unwrap();
        let extractor = CredentialExtractor::new(DEFAULT_HOST, CredentialStrategy::ServerTiming);
        let headers = extractor.extract_headers(&capture).unwrap();
        assert_eq!(headers.get("Authorization"), Some("Bearer x"));

        let markup = r#"<script>var cfg = {"availabilityUrl":"https:\/\/multipass.wizzair.com\/w6\/subscriptions\/json\/availability\/sess-9"};</script>"#;
        let creds = CredentialExtractor::new(DEFAULT_HOST, CredentialStrategy::Auto)
            .resolve(None, markup)
            .unwrap();
        assert_eq!(creds.headers, HeaderSet::fallback());
        assert_eq!(
            creds.endpoint,
            "https://multipass.wizzair.com/w6/subscriptions/json/availability/sess-9"
        );
    }

    #[test]
    fn test_missing_endpoint_is_extraction_failure() {
        let err = CredentialExtractor::new(DEFAULT_HOST, CredentialStrategy::Auto)
            .resolve(None, "<html></html>")
            .unwrap_err();
        assert!(matches!(err, FlypassError::ExtractionFailed(_)));
    }

    #[test]
    fn test_content_type_is_forced_once() {
        let mut headers = HeaderSet::new();
        headers.insert("content-type", "text/plain");
        let forced = headers.with_json_content_type();
        assert_eq!(forced.len(), 1);
        assert_eq!(forced.get("Content-Type"), Some("application/json"));
    }
}
