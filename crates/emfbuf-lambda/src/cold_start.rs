//! Process-scoped cold start flag.
//!
//! Exactly one `observe` call per tracker returns `true`. The write is a
//! compare-and-set, so concurrent first invocations agree on a single winner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static PROCESS: OnceLock<Arc<ColdStartTracker>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct ColdStartTracker {
    observed: AtomicBool,
}

impl ColdStartTracker {
    /// A fresh tracker. Tests use private trackers; handlers use `process()`.
    pub fn new() -> Self {
        Self {
            observed: AtomicBool::new(false),
        }
    }

    /// The tracker shared by everything in this process.
    pub fn process() -> Arc<ColdStartTracker> {
        Arc::clone(PROCESS.get_or_init(|| Arc::new(ColdStartTracker::new())))
    }

    /// Returns `true` for the first caller only.
    pub fn observe(&self) -> bool {
        self.observed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_observed(&self) -> bool {
        self.observed.load(Ordering::Acquire)
    }
}
