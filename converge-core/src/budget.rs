//! Shared timeout budget for one reconciliation pass.

use std::time::{Duration, Instant};

/// Fallback horizon when `now + total` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A single overall deadline that every nested wait draws from.
///
/// Budgets are `Copy`; narrowing produces a budget whose deadline never
/// exceeds the one it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    started: Instant,
    deadline: Instant,
}

impl Budget {
    pub fn new(total: Duration) -> Self {
        let started = Instant::now();
        let deadline = started
            .checked_add(total)
            .or_else(|| started.checked_add(FAR_FUTURE))
            .unwrap_or(started);
        Self { started, deadline }
    }

    /// A budget that is already spent.
    pub fn exhausted() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
