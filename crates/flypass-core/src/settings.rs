// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::cache::DEFAULT_TTL_MINUTES;
use crate::credentials::CredentialStrategy;
use crate::returns::{DEFAULT_MIN_LAYOVER_MINUTES, DEFAULT_WINDOW_DAYS};
use crate::{DEFAULT_HOST, DEFAULT_PAGE_URL};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";

/// One year.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;
pub const MAX_LAYOVER_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_WINDOW_DAYS: u32 = 14;

/// User-tunable knobs, stored as `settings.json` in the config root.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub page_url: String,
    /// How long search results stay valid.
    pub cache_ttl_minutes: i64,
    /// Pause between consecutive availability requests.
    pub throttle_ms: u64,
    pub return_window_days: u32,
    pub min_layover_minutes: i64,
    pub request_timeout_secs: u64,
    pub credential_strategy: CredentialStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            cache_ttl_minutes: DEFAULT_TTL_MINUTES,
            throttle_ms: 200,
            return_window_days: DEFAULT_WINDOW_DAYS,
            min_layover_minutes: DEFAULT_MIN_LAYOVER_MINUTES,
            request_timeout_secs: 30,
            credential_strategy: CredentialStrategy::Auto,
        }
    }
}

impl Settings {
    pub fn path_in(config_root: &Path) -> PathBuf {
        config_root.join(SETTINGS_FILE)
    }

    /// Reads settings; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Rejects values outside the supported ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_TTL_MINUTES).contains(&self.cache_ttl_minutes) {
            bail!(
                "cache_ttl_minutes must be between 0 and {}, got {}",
                MAX_TTL_MINUTES,
                self.cache_ttl_minutes
            );
        }
        if !(0..=MAX_LAYOVER_MINUTES).contains(&self.min_layover_minutes) {
            bail!(
                "min_layover_minutes must be between 0 and {}, got {}",
                MAX_LAYOVER_MINUTES,
                self.min_layover_minutes
            );
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.return_window_days) {
            bail!(
                "return_window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.return_window_days
            );
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes.clamp(0, MAX_TTL_MINUTES))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn min_layover(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_layover_minutes.clamp(0, MAX_LAYOVER_MINUTES))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
