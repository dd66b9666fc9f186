// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, File};
use std::path::Path;

pub const LOG_FILE: &str = "flypass.log";

/// Terminal level for a `-v` count.
pub fn term_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Terminal logging per `-v`, plus a debug log file in the config root.
pub fn init(verbosity: u8, config_root: &Path) -> Result<()> {
    fs::create_dir_all(config_root).context("Failed to create config directory")?;
    let log_path = config_root.join(LOG_FILE);
    let file = File::create(&log_path)
        .with_context(|| format!("Failed to create {}", log_path.display()))?;

    let config = ConfigBuilder::new()
        .add_filter_allow_str("flypass")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            term_level(verbosity),
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, config, file),
    ])
    .context("Failed to initialise logging")
}
