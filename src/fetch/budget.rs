//! Request budget shared by all pagers of one fetch cycle.

use std::sync::atomic::{AtomicU32, Ordering};

/// Counts down the search requests a cycle may still issue.
///
/// Seeded from the rate-limit status endpoint (capped by configuration) and
/// lowered whenever a response reports a smaller remaining quota.
#[derive(Debug)]
pub struct RequestBudget {
    remaining: AtomicU32,
}

impl RequestBudget {
    pub fn new(requests: u32) -> Self {
        Self {
            remaining: AtomicU32::new(requests),
        }
    }

    /// Take one request from the budget; `false` when exhausted.
    pub fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Lower the budget to the upstream's reported remaining quota.
    pub fn observe_remaining(&self, upstream_remaining: u32) {
        self.remaining.fetch_min(upstream_remaining, Ordering::AcqRel);
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }
}
