// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

mod browser;
mod logging;
mod progress;
mod render;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use flypass_core::availability::AvailabilityClient;
use flypass_core::cache::{CacheKey, ResultCache};
use flypass_core::credentials::{CredentialExtractor, HeaderSet, NetworkCapture};
use flypass_core::page::{FilePage, HttpPage, PageSource};
use flypass_core::search::{FlightSearch, SearchRequest};
use flypass_core::settings::Settings;
use flypass_core::store::FileStore;
use log::{debug, info, warn};
use std::path::PathBuf;

use browser::SystemBrowser;
use progress::TermProgress;

const CACHE_FILE: &str = "cache.json";

#[derive(Parser)]
#[command(author, version, about = "Find flights reachable with a multipass subscription", long_about = None)]
struct Cli {
    /// Saved copy (file path) or address (URL) of the logged-in multipass page
    #[arg(short, long, env = "FLYPASS_PAGE")]
    page: Option<String>,

    /// Network capture (HAR or resource-timing JSON) recorded on that page
    #[arg(short, long, env = "FLYPASS_CAPTURE")]
    capture: Option<PathBuf>,

    /// Address a saved page came from, when it cannot be detected
    #[arg(long)]
    page_url: Option<String>,

    /// Directory holding settings.json, cache.json and the log
    #[arg(long, env = "FLYPASS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// How long results stay cached, in minutes
    #[arg(long)]
    ttl_minutes: Option<i64>,

    /// Pause between availability requests, in milliseconds
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every destination from an airport on one date
    Search {
        /// Departure airport code; defaults to the last one searched
        origin: Option<String>,
        /// Departure date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Also look for return flights
        #[arg(short, long)]
        returns: bool,
        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
    },
    /// List destinations served from an airport
    Destinations { origin: Option<String> },
    /// Find return flights for one flight of a cached search
    Returns {
        origin: String,
        date: NaiveDate,
        flight_code: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Show the dates a search can be run for
    Dates,
    /// Inspect or clear cached results
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached searches
    List,
    /// Show one cached entry
    Show { key: String },
    /// Remove one entry, or every cached result with --all
    Clear {
        key: Option<String>,
        #[arg(long, conflicts_with = "key")]
        all: bool,
    },
    /// Remove expired entries
    Sweep,
}

fn load_settings(cli: &Cli, config_root: &std::path::Path) -> Result<Settings> {
    let mut settings = Settings::load(&Settings::path_in(config_root))?;
    if let Some(ttl) = cli.ttl_minutes {
        settings.cache_ttl_minutes = ttl;
    }
    if let Some(throttle) = cli.throttle_ms {
        settings.throttle_ms = throttle;
    }
    settings.validate()?;
    Ok(settings)
}

fn load_capture(cli: &Cli) -> Result<Option<NetworkCapture>> {
    let Some(path) = &cli.capture else {
        return Ok(None);
    };
    let capture = NetworkCapture::load(path)
        .with_context(|| format!("Failed to load capture {}", path.display()))?;
    debug!(
        "Loaded capture — path={} requests={} timings={}",
        path.display(),
        capture.requests.len(),
        capture.timings.len()
    );
    Ok(Some(capture))
}

fn page_source(
    cli: &Cli,
    settings: &Settings,
    capture: Option<&NetworkCapture>,
) -> Result<Option<Box<dyn PageSource>>> {
    let Some(page) = &cli.page else {
        return Ok(None);
    };

    if page.starts_with("http://") || page.starts_with("https://") {
        // Replays the captured session so the page renders logged in.
        let headers = capture
            .and_then(|c| {
                CredentialExtractor::new(&settings.host, settings.credential_strategy)
                    .extract_headers(c)
                    .ok()
            })
            .unwrap_or_else(HeaderSet::new);
        let source = HttpPage::new(page, headers, settings.request_timeout())?;
        return Ok(Some(Box::new(source)));
    }

    let mut source = FilePage::new(page);
    if let Some(url) = &cli.page_url {
        source = source.with_url(url);
    }
    Ok(Some(Box::new(source)))
}

fn build_search<'a>(
    settings: &'a Settings,
    cache: &'a mut ResultCache<FileStore>,
    client: &'a AvailabilityClient,
    page: Option<&'a dyn PageSource>,
    capture: Option<&'a NetworkCapture>,
) -> FlightSearch<'a, FileStore> {
    let mut search = FlightSearch::new(settings, cache, client, &SystemBrowser);
    if let Some(page) = page {
        search = search.with_page(page);
    }
    if let Some(capture) = capture {
        search = search.with_capture(capture);
    }
    search
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_root = cli
        .config_dir
        .clone()
        .unwrap_or_else(flypass_core::get_config_root);
    logging::init(cli.verbose, &config_root)?;
    let settings = load_settings(&cli, &config_root)?;

    let mut cache = ResultCache::new(
        FileStore::open(config_root.join(CACHE_FILE)),
        settings.cache_ttl(),
    );
    let swept = cache.sweep();
    if swept > 0 {
        info!("Removed {} expired cache entries", swept);
    }

    match &cli.command {
        Commands::Dates => {
            let today = Local::now().date_naive();
            print!("{}", render::render_dates(&render::selectable_dates(today, 4)));
        }
        Commands::Cache(command) => run_cache(command, &mut cache)?,
        Commands::Search {
            origin,
            date,
            returns,
            refresh,
        } => {
            let capture = load_capture(&cli)?;
            let page = page_source(&cli, &settings, capture.as_ref())?;
            let client = AvailabilityClient::new(settings.request_timeout())?;
            let request = SearchRequest {
                origin: origin
                    .clone()
                    .or_else(|| cache.last_airport())
                    .unwrap_or_default(),
                date: date.unwrap_or_else(|| Local::now().date_naive()),
                with_returns: *returns,
                refresh: *refresh,
            };

            let mut search =
                build_search(&settings, &mut cache, &client, page.as_deref(), capture.as_ref());

            let report = search.run(&request, &mut TermProgress::new())?;
            print!("{}", render::render_report(&report, &settings));
        }
        Commands::Destinations { origin } => {
            let origin = origin
                .clone()
                .or_else(|| cache.last_airport())
                .ok_or_else(|| anyhow!("Please enter a departure airport code."))?
                .to_uppercase();
            let capture = load_capture(&cli)?;
            let page = page_source(&cli, &settings, capture.as_ref())?;
            let client = AvailabilityClient::new(settings.request_timeout())?;

            let mut search =
                build_search(&settings, &mut cache, &client, page.as_deref(), capture.as_ref());

            let session = search.open_session()?;
            let destinations = search.destinations(&session, &origin)?;
            if destinations.is_empty() {
                println!("No destinations found from {}.", origin);
            } else {
                println!("{} destinations from {}:", destinations.len(), origin);
                println!("  {}", destinations.join(" "));
            }
        }
        Commands::Returns {
            origin,
            date,
            flight_code,
            refresh,
        } => {
            let capture = load_capture(&cli)?;
            let page = page_source(&cli, &settings, capture.as_ref())?;
            let client = AvailabilityClient::new(settings.request_timeout())?;

            let mut search =
                build_search(&settings, &mut cache, &client, page.as_deref(), capture.as_ref());

            let lookup = search.returns_for(
                origin,
                *date,
                flight_code,
                *refresh,
                &mut TermProgress::new(),
            )?;
            print!("{}", render::render_returns(&lookup, &settings));
        }
    }

    Ok(())
}

fn run_cache(command: &CacheCommand, cache: &mut ResultCache<FileStore>) -> Result<()> {
    match command {
        CacheCommand::List => {
            print!("{}", render::render_cache_list(&cache.list(), cache.ttl()));
        }
        CacheCommand::Show { key } => {
            let Some(entry) = cache.entry(key) else {
                println!("No cached results for {}.", key);
                return Ok(());
            };
            match CacheKey::parse(key) {
                Some(CacheKey::Outbound { origin, date }) => {
                    println!("Showing cached results for {} on {}", origin, render::long_date(date));
                    print!("{}", render::render_flights(&entry.results));
                }
                Some(CacheKey::Return { route, .. }) => {
                    println!("Cached return flights for {}", route);
                    print!("{}", render::render_flights(&entry.results));
                }
                None => warn!("Not a cache key: {}", key),
            }
        }
        CacheCommand::Clear { key, all } => {
            if *all {
                let removed = cache.clear_all()?;
                println!("All cached results have been cleared ({} entries).", removed);
            } else if let Some(key) = key {
                cache.clear(key)?;
                println!("Cleared {}.", key);
            } else {
                bail!("Give a cache key to clear, or --all");
            }
        }
        CacheCommand::Sweep => {
            let removed = cache.sweep();
            println!("Removed {} expired entries.", removed);
        }
    }
    Ok(())
}
