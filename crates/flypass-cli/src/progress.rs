// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use flypass_core::flight::Flight;
use flypass_core::progress::Progress;
use std::io::{self, Write};

/// Single status line on stderr, rewritten in place.
pub struct TermProgress {
    found: usize,
    active: bool,
}

impl TermProgress {
    pub fn new() -> Self {
        Self {
            found: 0,
            active: false,
        }
    }
}

impl Progress for TermProgress {
    fn begin(&mut self, _total: usize) {
        self.found = 0;
    }

    fn log(&mut self, msg: &str) {
        let mut err = io::stderr();
        let _ = write!(err, "\r\x1b[2K{} ({} found)", msg, self.found);
        let _ = err.flush();
        self.active = true;
    }

    fn flights_found(&mut self, flights: &[Flight]) {
        self.found += flights.len();
    }

    fn finish(&mut self) {
        if self.active {
            eprintln!();
            self.active = false;
        }
    }
}
