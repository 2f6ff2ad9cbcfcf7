//! Build version allocation
//!
//! Every build attempt gets a version from a monotonically increasing,
//! process-wide counter, assigned at build start so versions reflect attempt
//! order rather than completion order. The counter is behind a trait so tests
//! can inject a fresh one instead of depending on global process state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Allocator of build versions
///
/// Only the build coordinator calls [`next`](VersionCounter::next), at build
/// start; everything else observes versions through `BuildOutput`.
pub trait VersionCounter: Send + Sync {
    /// Allocate the next build version
    fn next(&self) -> u64;

    /// The most recently allocated version, 0 if none yet
    fn current(&self) -> u64;
}

/// Process-wide atomic version counter
///
/// Never reset for the life of the process; a restart is the only reset.
#[derive(Debug, Default)]
pub struct ProcessCounter {
    value: AtomicU64,
}

impl ProcessCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Start counting from a known value, for tests that assert exact versions
    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

impl VersionCounter for ProcessCounter {
    fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

static PROCESS_COUNTER: Lazy<Arc<ProcessCounter>> = Lazy::new(|| Arc::new(ProcessCounter::new()));

/// The shared process-wide counter used by groups that don't inject their own
pub fn process_counter() -> Arc<ProcessCounter> {
    PROCESS_COUNTER.clone()
}
