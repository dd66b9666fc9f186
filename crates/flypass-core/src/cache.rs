// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::flight::Flight;
use crate::store::KvStore;
use crate::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Store key remembering the last origin searched.
pub const LAST_AIRPORT_KEY: &str = "lastAirport";

pub const DEFAULT_TTL_MINUTES: i64 = 8 * 60;

static OUTBOUND_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)-(\d{4}-\d{2}-\d{2})$").unwrap());
static RETURN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)-(\d{4}-\d{2}-\d{2})-return-(.+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub results: Vec<Flight>,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.timestamp_millis().saturating_sub(self.timestamp) >= ttl.num_milliseconds()
    }
}

/// Parsed form of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    Outbound { origin: String, date: NaiveDate },
    Return { origin: String, date: NaiveDate, route: String },
}

impl CacheKey {
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(cap) = OUTBOUND_KEY.captures(key) {
            let date = NaiveDate::parse_from_str(&cap[2], "%Y-%m-%d").ok()?;
            return Some(CacheKey::Outbound {
                origin: cap[1].to_string(),
                date,
            });
        }
        if let Some(cap) = RETURN_KEY.captures(key) {
            let date = NaiveDate::parse_from_str(&cap[2], "%Y-%m-%d").ok()?;
            return Some(CacheKey::Return {
                origin: cap[1].to_string(),
                date,
                route: cap[3].to_string(),
            });
        }
        None
    }
}

/// `LTN-2024-01-01`
pub fn outbound_key(origin: &str, date: NaiveDate) -> String {
    format!("{}-{}", origin.to_uppercase(), date.format("%Y-%m-%d"))
}

/// `LTN-2024-01-01-return-LTN (London Luton) to BVA (Paris Beauvais) - W6 1234`
pub fn return_key(outbound_key: &str, route_label: &str) -> String {
    format!("{}-return-{}", outbound_key, route_label)
}

/// A cached outbound search, as listed for browsing.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSearch {
    pub key: String,
    pub origin: String,
    pub date: NaiveDate,
    pub captured_at: Option<DateTime<Utc>>,
    pub flight_count: usize,
}

/// Flight results keyed by search, expiring after a fixed window.
///
/// Expiry is lazy: `get` evicts a stale entry when it sees one. `sweep`
/// evicts every stale cache entry at once and is run at startup.
pub struct ResultCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: KvStore> ResultCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set(&mut self, key: &str, results: &[Flight]) -> Result<()> {
        self.set_at(key, results, Utc::now())
    }

    pub fn set_at(&mut self, key: &str, results: &[Flight], now: DateTime<Utc>) -> Result<()> {
        let entry = CacheEntry {
            results: results.to_vec(),
            timestamp: now.timestamp_millis(),
        };
        self.store.set_raw(key, serde_json::to_string(&entry)?)?;
        debug!("Cached results — key={} flights={}", key, results.len());
        Ok(())
    }

    pub fn get(&mut self, key: &str) -> Option<Vec<Flight>> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Vec<Flight>> {
        self.entry_at(key, now).map(|entry| entry.results)
    }

    pub fn entry(&mut self, key: &str) -> Option<CacheEntry> {
        self.entry_at(key, Utc::now())
    }

    /// The live entry under `key`; stale or unreadable entries are evicted.
    pub fn entry_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let raw = self.store.get_raw(key)?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if !entry.is_expired_at(now, self.ttl) => Some(entry),
            Ok(_) => {
                debug!("Cache entry expired — key={}", key);
                self.evict(key);
                None
            }
            Err(e) => {
                warn!("Dropping unreadable cache entry — key={} error={}", key, e);
                self.evict(key);
                None
            }
        }
    }

    pub fn clear(&mut self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    /// Removes every outbound and return entry; other keys stay.
    pub fn clear_all(&mut self) -> Result<usize> {
        let keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| CacheKey::parse(k).is_some())
            .collect();
        for key in &keys {
            self.store.remove(key)?;
        }
        Ok(keys.len())
    }

    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Evicts every expired cache entry, returning how many went.
    pub fn sweep_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        for key in self.store.keys() {
            if CacheKey::parse(&key).is_none() {
                continue;
            }
            let Some(raw) = self.store.get_raw(&key) else {
                continue;
            };
            let stale = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entry.is_expired_at(now, self.ttl),
                Err(_) => true,
            };
            if stale && self.evict(&key) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("Cache sweep — evicted={}", evicted);
        }
        evicted
    }

    pub fn list(&mut self) -> Vec<CachedSearch> {
        self.list_at(Utc::now())
    }

    /// Live outbound searches ordered by date then origin.
    pub fn list_at(&mut self, now: DateTime<Utc>) -> Vec<CachedSearch> {
        let mut searches = Vec::new();
        for key in self.store.keys() {
            let Some(CacheKey::Outbound { origin, date }) = CacheKey::parse(&key) else {
                continue;
            };
            if let Some(entry) = self.entry_at(&key, now) {
                searches.push(CachedSearch {
                    key,
                    origin,
                    date,
                    captured_at: entry.captured_at(),
                    flight_count: entry.results.len(),
                });
            }
        }
        searches.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.origin.cmp(&b.origin)));
        searches
    }

    pub fn last_airport(&self) -> Option<String> {
        self.store
            .get_raw(LAST_AIRPORT_KEY)
            .filter(|code| !code.trim().is_empty())
    }

    pub fn set_last_airport(&mut self, code: &str) -> Result<()> {
        self.store.set_raw(LAST_AIRPORT_KEY, code.trim().to_uppercase())
    }

    fn evict(&mut self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to evict cache entry — key={} error={}", key, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn flight(code: &str) -> Flight {
        Flight {
            departure_station: "LTN".into(),
            arrival_station: "BVA".into(),
            flight_code: code.into(),
            departure_date: "2024-01-01".into(),
            departure: "08:00".into(),
            arrival: "10:00".into(),
            ..Default::default()
        }
    }

    fn cache() -> ResultCache<MemoryStore> {
        ResultCache::new(MemoryStore::new(), Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_round_trip_within_window() {
        let mut cache = cache();
        let key = outbound_key("ltn", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(key, "LTN-2024-01-01");

        let flights = vec![flight("W6 1"), flight("W6 2")];
        cache.set_at(&key, &flights, t0()).unwrap();

        assert_eq!(cache.get_at(&key, t0()), Some(flights.clone()));
        assert_eq!(
            cache.get_at(&key, t0() + Duration::minutes(479)),
            Some(flights)
        );
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let mut cache = cache();
        cache.set_at("LTN-2024-01-01", &[flight("W6 1")], t0()).unwrap();

        assert_eq!(cache.get_at("LTN-2024-01-01", t0() + Duration::hours(8)), None);
        assert!(cache.store().get_raw("LTN-2024-01-01").is_none());
    }

    #[test]
    fn test_shorter_window() {
        let mut cache = ResultCache::new(MemoryStore::new(), Duration::minutes(30));
        cache.set_at("LTN-2024-01-01", &[flight("W6 1")], t0()).unwrap();
        assert!(cache.get_at("LTN-2024-01-01", t0() + Duration::minutes(29)).is_some());
        assert!(cache.get_at("LTN-2024-01-01", t0() + Duration::minutes(31)).is_none());
    }

    #[test]
    fn test_sweep_only_touches_cache_keys() {
        let mut cache = cache();
        let ret = return_key("LTN-2024-01-01", &flight("W6 1").route_label());
        cache.set_at("LTN-2024-01-01", &[flight("W6 1")], t0()).unwrap();
        cache.set_at(&ret, &[], t0()).unwrap();
        cache
            .set_at("LTN-2024-01-02", &[], t0() + Duration::hours(7))
            .unwrap();
        cache.set_last_airport("ltn").unwrap();

        let evicted = cache.sweep_at(t0() + Duration::hours(9));

        assert_eq!(evicted, 2);
        let keys = cache.store().keys();
        assert_eq!(keys, vec!["LTN-2024-01-02".to_string(), "lastAirport".to_string()]);
        assert_eq!(cache.last_airport(), Some("LTN".to_string()));
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let mut store = MemoryStore::new();
        store.set_raw("LTN-2024-01-01", "{\"results\":".to_string()).unwrap();
        let mut cache = ResultCache::new(store, Duration::hours(8));

        assert!(cache.get_at("LTN-2024-01-01", t0()).is_none());
        assert!(cache.store().keys().is_empty());
    }

    #[test]
    fn test_list_and_clear_all() {
        let mut cache = cache();
        cache.set_at("WAW-2024-01-02", &[flight("W6 9")], t0()).unwrap();
        cache
            .set_at("LTN-2024-01-01", &[flight("W6 1"), flight("W6 2")], t0())
            .unwrap();
        cache
            .set_at(&return_key("LTN-2024-01-01", "x"), &[], t0())
            .unwrap();
        cache.set_last_airport("WAW").unwrap();

        let listed = cache.list_at(t0());
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].origin, "LTN");
        assert_eq!(listed[0].flight_count, 2);
        assert_eq!(listed[1].key, "WAW-2024-01-02");

        assert_eq!(cache.clear_all().unwrap(), 3);
        assert_eq!(cache.store().keys(), vec![LAST_AIRPORT_KEY.to_string()]);
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(
            CacheKey::parse("LTN-2024-01-01"),
            Some(CacheKey::Outbound {
                origin: "LTN".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            })
        );
        match CacheKey::parse("LTN-2024-01-01-return-BVA (Paris) to LTN (London) - W6 2") {
            Some(CacheKey::Return { origin, route, .. }) => {
                assert_eq!(origin, "LTN");
                assert_eq!(route, "BVA (Paris) to LTN (London) - W6 2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(CacheKey::parse(LAST_AIRPORT_KEY), None);
        assert_eq!(CacheKey::parse("LTN-2024-13-45"), None);
    }
}
