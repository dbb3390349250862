//! Atomic counters for membrane observability.
//!
//! All counters use relaxed ordering; they are diagnostic, not
//! synchronisation primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::TrapKind;

/// Per-membrane operation counters.
#[derive(Debug)]
pub struct MembraneMetrics {
    /// Values returned unchanged because they are primitives.
    pub passthroughs: AtomicU64,
    /// Values returned unchanged because they already are our replicas.
    pub replica_hits: AtomicU64,
    /// Wraps answered from the replica table.
    pub cell_hits: AtomicU64,
    /// New replicas minted.
    pub replicas_created: AtomicU64,
    /// Table slots reclaimed after their replica died.
    pub slots_reclaimed: AtomicU64,
    pub get_traps: AtomicU64,
    pub set_traps: AtomicU64,
    pub delete_traps: AtomicU64,
    pub apply_traps: AtomicU64,
    pub construct_traps: AtomicU64,
    /// Traps whose handler returned an error.
    pub handler_errors: AtomicU64,
}

impl MembraneMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            passthroughs: AtomicU64::new(0),
            replica_hits: AtomicU64::new(0),
            cell_hits: AtomicU64::new(0),
            replicas_created: AtomicU64::new(0),
            slots_reclaimed: AtomicU64::new(0),
            get_traps: AtomicU64::new(0),
            set_traps: AtomicU64::new(0),
            delete_traps: AtomicU64::new(0),
            apply_traps: AtomicU64::new(0),
            construct_traps: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
        }
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Counter for one trap kind.
    #[must_use]
    pub fn trap_counter(&self, trap: TrapKind) -> &AtomicU64 {
        match trap {
            TrapKind::Get => &self.get_traps,
            TrapKind::Set => &self.set_traps,
            TrapKind::DeleteProperty => &self.delete_traps,
            TrapKind::Apply => &self.apply_traps,
            TrapKind::Construct => &self.construct_traps,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passthroughs: Self::get(&self.passthroughs),
            replica_hits: Self::get(&self.replica_hits),
            cell_hits: Self::get(&self.cell_hits),
            replicas_created: Self::get(&self.replicas_created),
            slots_reclaimed: Self::get(&self.slots_reclaimed),
            get_traps: Self::get(&self.get_traps),
            set_traps: Self::get(&self.set_traps),
            delete_traps: Self::get(&self.delete_traps),
            apply_traps: Self::get(&self.apply_traps),
            construct_traps: Self::get(&self.construct_traps),
            handler_errors: Self::get(&self.handler_errors),
        }
    }
}

impl Default for MembraneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a membrane's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub passthroughs: u64,
    pub replica_hits: u64,
    pub cell_hits: u64,
    pub replicas_created: u64,
    pub slots_reclaimed: u64,
    pub get_traps: u64,
    pub set_traps: u64,
    pub delete_traps: u64,
    pub apply_traps: u64,
    pub construct_traps: u64,
    pub handler_errors: u64,
}

impl MetricsSnapshot {
    #[must_use]
    pub const fn total_traps(&self) -> u64 {
        self.get_traps + self.set_traps + self.delete_traps + self.apply_traps + self.construct_traps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = MembraneMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn trap_counters_are_distinct() {
        let m = MembraneMetrics::new();
        for trap in TrapKind::ALL {
            MembraneMetrics::inc(m.trap_counter(trap));
        }
        MembraneMetrics::inc(m.trap_counter(TrapKind::Get));
        let snap = m.snapshot();
        assert_eq!(snap.get_traps, 2);
        assert_eq!(snap.construct_traps, 1);
        assert_eq!(snap.total_traps(), 6);
    }
}
