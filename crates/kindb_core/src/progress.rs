//! Throttled progress reporting for long operations.

use std::time::{Duration, Instant};

/// Reports percentage progress to a callback, at most every `interval`
/// and only when the percentage moved by at least `step`.
///
/// The final 100 is always reported.
pub struct Progress<'a> {
    callback: &'a mut dyn FnMut(u8),
    total: usize,
    done: usize,
    last_pct: Option<u8>,
    last_report: Option<Instant>,
    interval: Duration,
    step: u8,
}

impl<'a> Progress<'a> {
    /// Creates a reporter for `total` units of work.
    pub fn new(callback: &'a mut dyn FnMut(u8), total: usize, interval: Duration, step: u8) -> Self {
        Self {
            callback,
            total,
            done: 0,
            last_pct: None,
            last_report: None,
            interval,
            step: step.max(1),
        }
    }

    /// Adds `n` to the total, for work discovered late.
    pub fn extend(&mut self, n: usize) {
        self.total += n;
    }

    /// Marks one unit done.
    pub fn tick(&mut self) {
        self.done += 1;
        let pct = self.percent();
        let moved = self
            .last_pct
            .map_or(true, |last| pct.saturating_sub(last) >= self.step);
        let waited = self
            .last_report
            .map_or(true, |at| at.elapsed() >= self.interval);
        if moved && waited {
            self.report(pct);
        }
    }

    /// Reports completion.
    pub fn finish(&mut self) {
        if self.last_pct != Some(100) {
            self.report(100);
        }
    }

    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.done.min(self.total) * 100) / self.total;
        u8::try_from(pct).unwrap_or(100)
    }

    fn report(&mut self, pct: u8) {
        self.last_pct = Some(pct);
        self.last_report = Some(Instant::now());
        (self.callback)(pct);
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("total", &self.total)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
