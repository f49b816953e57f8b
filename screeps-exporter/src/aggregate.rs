//! Grouping passes that reduce room objects and users to labeled totals.
//!
//! Each pass is a single fold over its input into an ordered map keyed by a
//! composite group key. Sums and counts only, so results do not depend on the
//! order objects arrive in. A group appears in the output only if at least one
//! object contributed to it.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use screeps_common::WorldObject;

use crate::classify::{is_creep, is_energy_holder, is_mineral_holder, is_structure};
use crate::cost::body_cost;
use crate::directory::Directory;

/// Group key for per-room families.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomKey {
    pub user_name: String,
    pub room: String,
}

impl RoomKey {
    pub fn new(user_name: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            room: room.into(),
        }
    }

    fn of(obj: &WorldObject, directory: &Directory) -> Self {
        Self::new(directory.display_name(&obj.user_id), obj.room.as_str())
    }
}

/// Group key for per-room families with a secondary dimension
/// (structure type or resource kind).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomKindKey {
    pub user_name: String,
    pub room: String,
    pub kind: String,
}

impl RoomKindKey {
    pub fn new(
        user_name: impl Into<String>,
        room: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            room: room.into(),
            kind: kind.into(),
        }
    }
}

/// Creep count and body cost for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreepTotals {
    pub count: u64,
    pub cost: u64,
}

impl AddAssign for CreepTotals {
    fn add_assign(&mut self, other: Self) {
        self.count += other.count;
        self.cost += other.cost;
    }
}

/// Per-user figures taken straight from the user record.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub user_name: String,
    pub cpu_used_last_tick: f64,
    pub cpu_budget_total: f64,
    pub gcl_level: f64,
    pub owned_room_count: u64,
    pub currency_balance: f64,
}

/// Summed energy per (user, room).
pub fn energy_by_room(objects: &[WorldObject], directory: &Directory) -> BTreeMap<RoomKey, f64> {
    let mut grouped = BTreeMap::new();

    for obj in objects.iter().filter(|obj| is_energy_holder(obj)) {
        let energy = obj.store.as_ref().map(|store| store.energy()).unwrap_or(0.0);
        *grouped.entry(RoomKey::of(obj, directory)).or_insert(0.0) += energy;
    }

    grouped
}

/// Summed amount per (user, room, resource) for every non-energy resource.
pub fn minerals_by_room(
    objects: &[WorldObject],
    directory: &Directory,
) -> BTreeMap<RoomKindKey, f64> {
    let mut grouped = BTreeMap::new();

    for obj in objects.iter().filter(|obj| is_mineral_holder(obj)) {
        let Some(store) = &obj.store else {
            continue;
        };
        let user_name = directory.display_name(&obj.user_id);
        for (resource, amount) in store.minerals() {
            let key = RoomKindKey::new(user_name, obj.room.as_str(), resource);
            *grouped.entry(key).or_insert(0.0) += amount;
        }
    }

    grouped
}

/// Count of non-creep objects per (user, room, type).
pub fn structures_by_room(
    objects: &[WorldObject],
    directory: &Directory,
) -> BTreeMap<RoomKindKey, u64> {
    let mut grouped = BTreeMap::new();

    for obj in objects.iter().filter(|obj| is_structure(obj)) {
        let key = RoomKindKey::new(
            directory.display_name(&obj.user_id),
            obj.room.as_str(),
            obj.kind.as_str(),
        );
        *grouped.entry(key).or_insert(0) += 1;
    }

    grouped
}

/// Creep count and summed body cost per (user, room).
pub fn creeps_by_room(
    objects: &[WorldObject],
    directory: &Directory,
) -> BTreeMap<RoomKey, CreepTotals> {
    let mut grouped: BTreeMap<RoomKey, CreepTotals> = BTreeMap::new();

    for obj in objects.iter().filter(|obj| is_creep(obj)) {
        *grouped.entry(RoomKey::of(obj, directory)).or_default() += CreepTotals {
            count: 1,
            cost: body_cost(&obj.body),
        };
    }

    grouped
}

/// One summary per admitted user, ordered by user id.
///
/// Users without a display name are labeled with `unknown_label`.
pub fn user_summaries(directory: &Directory, unknown_label: &str) -> Vec<UserSummary> {
    directory
        .users()
        .map(|user| {
            let user_name = match user.display_name.as_deref() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => unknown_label.to_string(),
            };

            UserSummary {
                user_name,
                cpu_used_last_tick: user.cpu_used_last_tick,
                cpu_budget_total: user.cpu_budget_total,
                gcl_level: user.gcl_level,
                owned_room_count: user.owned_rooms.len() as u64,
                currency_balance: user.currency_balance,
            }
        })
        .collect()
}

/// Results of the four room-object passes over one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomAggregates {
    pub energy: BTreeMap<RoomKey, f64>,
    pub minerals: BTreeMap<RoomKindKey, f64>,
    pub structures: BTreeMap<RoomKindKey, u64>,
    pub creeps: BTreeMap<RoomKey, CreepTotals>,
}

impl RoomAggregates {
    /// Run every room pass over the same snapshot.
    pub fn compute(objects: &[WorldObject], directory: &Directory) -> Self {
        Self {
            energy: energy_by_room(objects, directory),
            minerals: minerals_by_room(objects, directory),
            structures: structures_by_room(objects, directory),
            creeps: creeps_by_room(objects, directory),
        }
    }

    /// Number of distinct groups across all passes.
    pub fn group_count(&self) -> usize {
        self.energy.len() + self.minerals.len() + self.structures.len() + self.creeps.len()
    }
}
