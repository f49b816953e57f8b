//! Per-family object predicates.
//!
//! These are independent tests, not a partition: a storage holding energy and
//! minerals is an energy holder, a mineral holder and a structure at once.

use screeps_common::WorldObject;

/// Object kinds counted as creeps rather than structures.
pub const CREEP_KINDS: [&str; 1] = ["creep"];

/// Has a store with an `energy` entry, even a zero one.
pub fn is_energy_holder(obj: &WorldObject) -> bool {
    obj.store.as_ref().is_some_and(|store| store.has_energy())
}

/// Has a store with at least one non-energy entry.
pub fn is_mineral_holder(obj: &WorldObject) -> bool {
    obj.store
        .as_ref()
        .is_some_and(|store| store.minerals().next().is_some())
}

pub fn is_creep(obj: &WorldObject) -> bool {
    CREEP_KINDS.contains(&obj.kind.as_str())
}

pub fn is_structure(obj: &WorldObject) -> bool {
    !is_creep(obj)
}
