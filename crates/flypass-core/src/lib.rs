// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod availability;
pub mod cache;
pub mod credentials;
pub mod destinations;
pub mod flight;
pub mod page;
pub mod progress;
pub mod returns;
pub mod scan;
pub mod search;
pub mod settings;
pub mod store;

use std::path::PathBuf;
use thiserror::Error;

/// Host serving the multipass pages and the availability endpoint.
pub const DEFAULT_HOST: &str = "multipass.wizzair.com";

/// Page the user has to be logged into for credentials to exist.
pub const DEFAULT_PAGE_URL: &str =
    "https://multipass.wizzair.com/w6/subscriptions/spa/private-page/wallets";

#[derive(Error, Debug)]
pub enum FlypassError {
    #[error("Not on the multipass page ({0}). Opening the correct page for you. Please enter any random route and press Search.")]
    NotOnTargetPage(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Page elements not found: {0}")]
    ElementsNotFound(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },
    #[error("Rate limited (HTTP 429)")]
    RateLimited,
    #[error("Request credentials not found: {0}")]
    CredentialMissing(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlypassError {
    /// A 429 ends a batch; everything else is skipped per route.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FlypassError::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, FlypassError>;

/// Per-user configuration directory holding `settings.json`, `cache.json` and the log.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "flypass", "flypass")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".flypass"))
}

/// Matches `host` exactly or any subdomain of it.
pub fn host_matches(url: &str, host: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(h) => {
            let h = h.to_ascii_lowercase();
            let host = host.to_ascii_lowercase();
            h == host || h.ends_with(&format!(".{}", host))
        }
        None => false,
    }
}
