// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use flypass_core::page::TabControl;
use flypass_core::Result;
use log::info;

/// Opens pages in the system's default browser.
pub struct SystemBrowser;

impl TabControl for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        info!("Opening browser — url={}", url);
        open::that(url)?;
        Ok(())
    }
}
