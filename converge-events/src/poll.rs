//! Blocking poll loop shared by every waiter.

use std::thread;
use std::time::Duration;

use converge_core::{Budget, ConvergeError};

/// Re-evaluates a probe at a fixed interval until it succeeds or the budget
/// runs out.
///
/// The probe is called once immediately, then once per interval. It is
/// expected to refresh remote state on every call and is never memoized. If
/// the budget is already exhausted the wait fails without calling the probe.
#[derive(Debug, Clone, Copy)]
pub struct PollCondition {
    interval: Duration,
}

impl PollCondition {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `predicate` returns `true`.
    pub fn wait<F>(
        &self,
        budget: &Budget,
        what: &str,
        mut predicate: F,
    ) -> Result<(), ConvergeError>
    where
        F: FnMut() -> Result<bool, ConvergeError>,
    {
        self.until(budget, what, || Ok(predicate()?.then_some(())))
    }

    /// Wait until `probe` yields a value and return it.
    pub fn until<T, F>(
        &self,
        budget: &Budget,
        what: &str,
        mut probe: F,
    ) -> Result<T, ConvergeError>
    where
        F: FnMut() -> Result<Option<T>, ConvergeError>,
    {
        if budget.is_exhausted() {
            return Err(timeout(budget, what));
        }
        if let Some(value) = probe()? {
            return Ok(value);
        }

        let mut polls = 1u32;
        loop {
            let remaining = budget.remaining();
            if remaining.is_zero() {
                tracing::debug!("gave up on {what} after {polls} poll(s)");
                return Err(timeout(budget, what));
            }
            thread::sleep(self.interval.min(remaining));
            if budget.is_exhausted() {
                tracing::debug!("gave up on {what} after {polls} poll(s)");
                return Err(timeout(budget, what));
            }
            polls += 1;
            if let Some(value) = probe()? {
                tracing::debug!("{what} satisfied after {polls} poll(s)");
                return Ok(value);
            }
        }
    }
}

fn timeout(budget: &Budget, what: &str) -> ConvergeError {
    ConvergeError::TimeoutExceeded {
        what: what.to_string(),
        elapsed: budget.elapsed(),
    }
}
