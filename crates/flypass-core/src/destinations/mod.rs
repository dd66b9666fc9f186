// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod autocomplete;
pub mod routes;

use crate::Result;

/// Lists the airports reachable from an origin.
pub trait DestinationResolver {
    fn destinations(&mut self, origin: &str) -> Result<Vec<String>>;
}

/// Resolves from the route table embedded in a page snapshot.
#[derive(Debug, Clone)]
pub struct EmbeddedRoutes {
    markup: String,
}

impl EmbeddedRoutes {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }
}

impl DestinationResolver for EmbeddedRoutes {
    fn destinations(&mut self, origin: &str) -> Result<Vec<String>> {
        routes::extract_destinations(&self.markup, origin)
    }
}
