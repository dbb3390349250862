//! Generational replica table.
//!
//! Holds both halves of a membrane's bookkeeping in one arena:
//! - `cells`: replicable identity -> slot index (at most one replica per
//!   replicable);
//! - the "known replicas" set: a replica is ours iff the slot named by its
//!   [`SlotHandle`] still carries the same generation and points at it.
//!
//! Slots hold only weak references, so the table never keeps a replicable
//! or a replica alive. A slot whose replica has died is reclaimed either
//! lazily on lookup or by [`ReplicaTable::sweep`]; reclaiming bumps the
//! generation so stale handles never alias a reused slot.
//!
//! Not synchronised; the membrane wraps it in a `parking_lot::Mutex`.

use std::collections::HashMap;
use std::sync::Weak;

use crate::replica::{Replica, ReplicaInner, Replicable, WeakReplicable};

/// `(index, generation)` handle naming a replica's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    /// Identity of the replicable, the key into `cells`.
    key: usize,
    target: Option<WeakReplicable>,
    replica: Weak<ReplicaInner>,
}

impl Slot {
    fn vacant(generation: u32) -> Self {
        Self {
            generation,
            key: 0,
            target: None,
            replica: Weak::new(),
        }
    }

    fn is_occupied(&self) -> bool {
        self.target.is_some()
    }

    fn is_dead(&self) -> bool {
        self.is_occupied()
            && (self.replica.strong_count() == 0
                || !self.target.as_ref().is_some_and(WeakReplicable::is_alive))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ReplicaTable {
    slots: Vec<Slot>,
    cells: HashMap<usize, u32>,
    free_list: Vec<u32>,
    inserts_since_sweep: usize,
    /// Slots released since the last [`ReplicaTable::take_reclaimed`].
    reclaimed: usize,
}

impl ReplicaTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether `replica` was minted through this table and is still
    /// registered.
    pub(crate) fn contains_replica(&self, replica: &Replica) -> bool {
        let handle = replica.slot();
        self.slots.get(handle.index as usize).is_some_and(|slot| {
            slot.is_occupied()
                && slot.generation == handle.generation
                && slot.replica.as_ptr() as usize == replica.identity()
        })
    }

    /// The live replica registered for `target`, if any. A registration whose
    /// replica has died is reclaimed on the spot.
    pub(crate) fn lookup(&mut self, target: &Replicable) -> Option<Replica> {
        let index = *self.cells.get(&target.identity())?;
        let upgraded = self.slots[index as usize].replica.upgrade();
        match upgraded {
            Some(inner) => Some(Replica::from_arc(inner)),
            None => {
                self.release(index);
                None
            }
        }
    }

    /// Claim a slot for a replica about to be minted. The slot stays vacant
    /// until [`ReplicaTable::fill`].
    pub(crate) fn reserve(&mut self) -> SlotHandle {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot::vacant(1));
                index
            }
        };
        SlotHandle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Register `replica` as the replica of `target` in a reserved slot.
    pub(crate) fn fill(&mut self, handle: SlotHandle, target: &Replicable, replica: &Replica) {
        let key = target.identity();
        let slot = &mut self.slots[handle.index as usize];
        debug_assert_eq!(slot.generation, handle.generation);
        debug_assert!(!slot.is_occupied());
        slot.key = key;
        slot.target = Some(target.downgrade());
        slot.replica = replica.downgrade();
        self.cells.insert(key, handle.index);
        self.inserts_since_sweep += 1;
    }

    /// Whether `interval` insertions have happened since the last sweep.
    pub(crate) fn sweep_due(&self, interval: usize) -> bool {
        self.inserts_since_sweep >= interval.max(1)
    }

    /// Reclaim every slot whose replica or replicable has died. Returns the
    /// number of slots reclaimed.
    pub(crate) fn sweep(&mut self) -> usize {
        self.inserts_since_sweep = 0;
        let dead: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_dead())
            .map(|(index, _)| index as u32)
            .collect();
        for &index in &dead {
            self.release(index);
        }
        dead.len()
    }

    /// Registered replicas that are still alive.
    pub(crate) fn live(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.is_occupied() && !slot.is_dead())
            .count()
    }

    /// Number of slots released, by lookup or sweep, since the last call.
    pub(crate) fn take_reclaimed(&mut self) -> usize {
        std::mem::take(&mut self.reclaimed)
    }

    /// Allocated slots, occupied or not.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if !slot.is_occupied() {
            return;
        }
        if self.cells.get(&slot.key) == Some(&index) {
            self.cells.remove(&slot.key);
        }
        let next = slot.generation.wrapping_add(1).max(1);
        *slot = Slot::vacant(next);
        self.free_list.push(index);
        self.reclaimed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ForwardingHandler;
    use crate::membrane::Membrane;
    use crate::object::ObjectRef;

    fn mint(table: &mut ReplicaTable, membrane: &Membrane, target: &Replicable) -> Replica {
        let handle = table.reserve();
        let replica = Replica::new(target.clone(), membrane.clone(), handle);
        table.fill(handle, target, &replica);
        replica
    }

    #[test]
    fn lookup_returns_registered_replica() {
        let membrane = Membrane::new(ForwardingHandler);
        let mut table = ReplicaTable::new();
        let target = Replicable::Object(ObjectRef::new());
        let replica = mint(&mut table, &membrane, &target);

        let found = table.lookup(&target).expect("registered");
        assert!(found.ptr_eq(&replica));
        assert!(table.contains_replica(&replica));
        assert_eq!(table.live(), 1);
    }

    #[test]
    fn dead_replica_is_reclaimed_on_lookup() {
        let membrane = Membrane::new(ForwardingHandler);
        let mut table = ReplicaTable::new();
        let target = Replicable::Object(ObjectRef::new());
        drop(mint(&mut table, &membrane, &target));

        assert!(table.lookup(&target).is_none());
        assert_eq!(table.live(), 0);
        assert_eq!(table.free_list.len(), 1);
        assert_eq!(table.take_reclaimed(), 1);
        assert_eq!(table.take_reclaimed(), 0);
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let membrane = Membrane::new(ForwardingHandler);
        let mut table = ReplicaTable::new();
        let first_target = Replicable::Object(ObjectRef::new());
        let first = mint(&mut table, &membrane, &first_target);
        let first_handle = first.slot();
        drop(first);
        assert_eq!(table.sweep(), 1);

        let second_target = Replicable::Object(ObjectRef::new());
        let second = mint(&mut table, &membrane, &second_target);
        assert_eq!(second.slot().index, first_handle.index);
        assert_ne!(second.slot().generation, first_handle.generation);
        assert_eq!(table.capacity(), 1);
    }

    #[test]
    fn replica_of_another_table_is_not_contained() {
        let membrane = Membrane::new(ForwardingHandler);
        let mut ours = ReplicaTable::new();
        let mut theirs = ReplicaTable::new();
        let target = Replicable::Object(ObjectRef::new());
        let _mine = mint(&mut ours, &membrane, &target);
        let foreign = mint(&mut theirs, &membrane, &target);

        // Same (index, generation), different replica.
        assert!(!ours.contains_replica(&foreign));
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let membrane = Membrane::new(ForwardingHandler);
        let mut table = ReplicaTable::new();
        let kept_target = Replicable::Object(ObjectRef::new());
        let kept = mint(&mut table, &membrane, &kept_target);
        for _ in 0..3 {
            let target = Replicable::Object(ObjectRef::new());
            drop(mint(&mut table, &membrane, &target));
        }
        assert!(table.sweep_due(4));
        assert_eq!(table.sweep(), 3);
        assert!(!table.sweep_due(4));
        assert_eq!(table.live(), 1);
        assert!(table.lookup(&kept_target).is_some_and(|r| r.ptr_eq(&kept)));
    }
}
