//! In-flight flag shared by an orchestrator's submissions.
//!
//! The flag also carries a detach epoch. A guard remembers the epoch it was
//! taken in; once the owner detaches, every guard taken earlier reports
//! itself detached and its holder stops acting on results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// At most one holder at a time.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
    epoch: AtomicU64,
}

/// Releases the flag when dropped.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flag: &'a SingleFlight,
    epoch: u64,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag, or `None` if it is already held.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                flag: self,
                epoch: self.epoch.load(Ordering::SeqCst),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Detach every guard taken so far. The flag itself stays held until the
    /// running call returns.
    pub fn detach(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl FlightGuard<'_> {
    /// Whether the owner detached after this guard was taken.
    pub fn is_detached(&self) -> bool {
        self.flag.epoch.load(Ordering::SeqCst) != self.epoch
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}
