//! Cooperative timer.
//!
//! Every inner loop of every strategy checks the timer between node
//! expansions. Cancellation is cooperative: no worker is interrupted, it
//! returns its best-so-far once the deadline has passed or one of the
//! attached end flags has been raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A deadline plus an OR of shared end flags.
#[derive(Clone)]
pub struct Timer {
    start: Instant,
    time_limit: Option<Duration>,
    end_booleans: Vec<Arc<AtomicBool>>,
}

impl Default for Timer {
    fn default() -> Self {
        Timer {
            start: Instant::now(),
            time_limit: None,
            end_booleans: Vec::new(),
        }
    }
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    /// Set the time limit in seconds.
    pub fn set_time_limit(&mut self, time_limit: f64) {
        self.time_limit = Some(Duration::from_secs_f64(time_limit));
    }

    /// Attach a shared end flag; the timer ends as soon as any attached
    /// flag is raised.
    pub fn add_end_boolean(&mut self, end: &Arc<AtomicBool>) {
        self.end_booleans.push(Arc::clone(end));
    }

    /// Elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// True once the deadline has passed or an end flag has been raised.
    pub fn needs_to_end(&self) -> bool {
        if let Some(limit) = self.time_limit {
            if self.start.elapsed() >= limit {
                return true;
            }
        }
        self.end_booleans
            .iter()
            .any(|end| end.load(Ordering::Relaxed))
    }

    /// Remaining time in seconds, infinite when no limit is set.
    pub fn remaining_time(&self) -> f64 {
        match self.time_limit {
            None => f64::INFINITY,
            Some(limit) => (limit.saturating_sub(self.start.elapsed())).as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_boolean_raises_the_timer() {
        let mut timer = Timer::new();
        let end = Arc::new(AtomicBool::new(false));
        timer.add_end_boolean(&end);
        assert!(!timer.needs_to_end());
        end.store(true, Ordering::Relaxed);
        assert!(timer.needs_to_end());
    }

    #[test]
    fn zero_time_limit_ends_immediately() {
        let mut timer = Timer::new();
        timer.set_time_limit(0.0);
        assert!(timer.needs_to_end());
    }
}
