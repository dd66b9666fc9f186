// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::flight::Flight;

/// Progress reporting for long-running batches (route scans, return searches).
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called at the start with the number of steps.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line, e.g. `Checking LTN to BVA... 3/12`.
    fn log(&mut self, _msg: &str) {}

    /// Flights found by the step that just ran.
    fn flights_found(&mut self, _flights: &[Flight]) {}

    /// Called when one step completes.
    fn step_done(&mut self, _done: usize, _total: usize) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
