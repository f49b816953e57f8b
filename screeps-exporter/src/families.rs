//! Catalogue of exported metric families and conversion from aggregates.
//!
//! Family names and label names are part of the external contract with
//! existing dashboards and must not change.

use crate::aggregate::{RoomAggregates, UserSummary};

pub const LABEL_USER: &str = "userName";
pub const LABEL_ROOM: &str = "room";
pub const LABEL_TYPE: &str = "type";

const USER_LABELS: &[&str] = &[LABEL_USER];
const ROOM_LABELS: &[&str] = &[LABEL_USER, LABEL_ROOM];
const ROOM_TYPE_LABELS: &[&str] = &[LABEL_USER, LABEL_ROOM, LABEL_TYPE];

/// Which scrape refreshes a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    /// Per-user figures, derived from the users collection alone.
    Users,
    /// Per-room figures, derived from room objects.
    Rooms,
}

impl MetricGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricGroup::Users => "users",
            MetricGroup::Rooms => "rooms",
        }
    }

    /// Families belonging to this group.
    pub fn families(self) -> impl Iterator<Item = &'static FamilyDescriptor> {
        ALL_FAMILIES.iter().filter(move |f| f.group == self)
    }
}

impl std::fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of groups one scrape covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Only(MetricGroup),
}

impl Scope {
    pub fn includes(&self, group: MetricGroup) -> bool {
        match self {
            Scope::All => true,
            Scope::Only(only) => *only == group,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Only(group) => write!(f, "{}", group),
        }
    }
}

/// Static description of one gauge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub group: MetricGroup,
}

pub const USERS_USED_CPU: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_used_cpu",
    help: "CPU used by the user during the last tick",
    labels: USER_LABELS,
    group: MetricGroup::Users,
};

pub const USERS_TOTAL_CPU: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_total_cpu",
    help: "CPU budget of the user",
    labels: USER_LABELS,
    group: MetricGroup::Users,
};

pub const USERS_GCL: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_GCL",
    help: "Global control level of the user",
    labels: USER_LABELS,
    group: MetricGroup::Users,
};

pub const USERS_ROOM_COUNT: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_total_room_count",
    help: "Number of rooms owned by the user",
    labels: USER_LABELS,
    group: MetricGroup::Users,
};

pub const USERS_MONEY: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_total_money",
    help: "Credit balance of the user",
    labels: USER_LABELS,
    group: MetricGroup::Users,
};

pub const ROOM_ENERGY: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_energy",
    help: "Energy held in stores per user and room",
    labels: ROOM_LABELS,
    group: MetricGroup::Rooms,
};

pub const ROOM_STRUCTURES: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_struct_count",
    help: "Number of non-creep objects per user, room and type",
    labels: ROOM_TYPE_LABELS,
    group: MetricGroup::Rooms,
};

pub const ROOM_CREEPS: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_creep_count",
    help: "Number of creeps per user and room",
    labels: ROOM_LABELS,
    group: MetricGroup::Rooms,
};

pub const ROOM_CREEP_COST: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_creep_cost_count",
    help: "Summed body part cost of creeps per user and room",
    labels: ROOM_LABELS,
    group: MetricGroup::Rooms,
};

pub const ROOM_MINERALS: FamilyDescriptor = FamilyDescriptor {
    name: "screep_users_mineral_type_count",
    help: "Non-energy resources held in stores per user, room and resource type",
    labels: ROOM_TYPE_LABELS,
    group: MetricGroup::Rooms,
};

/// Every exported family.
pub static ALL_FAMILIES: [FamilyDescriptor; 10] = [
    USERS_USED_CPU,
    USERS_TOTAL_CPU,
    USERS_GCL,
    USERS_ROOM_COUNT,
    USERS_MONEY,
    ROOM_ENERGY,
    ROOM_STRUCTURES,
    ROOM_CREEPS,
    ROOM_CREEP_COST,
    ROOM_MINERALS,
];

/// A full replacement label/value set for one family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyUpdate {
    pub family: FamilyDescriptor,
    /// Label values, ordered like `family.labels`, and the gauge value.
    pub samples: Vec<(Vec<String>, f64)>,
}

impl FamilyUpdate {
    pub fn new(family: FamilyDescriptor) -> Self {
        Self {
            family,
            samples: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, labels: I, value: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples
            .push((labels.into_iter().map(Into::into).collect(), value));
    }
}

/// Updates for the five per-user families.
pub fn user_family_updates(summaries: &[UserSummary]) -> Vec<FamilyUpdate> {
    let mut used = FamilyUpdate::new(USERS_USED_CPU);
    let mut total = FamilyUpdate::new(USERS_TOTAL_CPU);
    let mut gcl = FamilyUpdate::new(USERS_GCL);
    let mut rooms = FamilyUpdate::new(USERS_ROOM_COUNT);
    let mut money = FamilyUpdate::new(USERS_MONEY);

    for summary in summaries {
        let name = summary.user_name.as_str();
        used.push([name], summary.cpu_used_last_tick);
        total.push([name], summary.cpu_budget_total);
        gcl.push([name], summary.gcl_level);
        rooms.push([name], summary.owned_room_count as f64);
        money.push([name], summary.currency_balance);
    }

    vec![used, total, gcl, rooms, money]
}

/// Updates for the five per-room families.
pub fn room_family_updates(aggregates: &RoomAggregates) -> Vec<FamilyUpdate> {
    let mut energy = FamilyUpdate::new(ROOM_ENERGY);
    for (key, total) in &aggregates.energy {
        energy.push([key.user_name.as_str(), key.room.as_str()], *total);
    }

    let mut minerals = FamilyUpdate::new(ROOM_MINERALS);
    for (key, total) in &aggregates.minerals {
        minerals.push(
            [key.user_name.as_str(), key.room.as_str(), key.kind.as_str()],
            *total,
        );
    }

    let mut structures = FamilyUpdate::new(ROOM_STRUCTURES);
    for (key, count) in &aggregates.structures {
        structures.push(
            [key.user_name.as_str(), key.room.as_str(), key.kind.as_str()],
            *count as f64,
        );
    }

    let mut creeps = FamilyUpdate::new(ROOM_CREEPS);
    let mut creep_cost = FamilyUpdate::new(ROOM_CREEP_COST);
    for (key, totals) in &aggregates.creeps {
        let labels = [key.user_name.as_str(), key.room.as_str()];
        creeps.push(labels, totals.count as f64);
        creep_cost.push(labels, totals.cost as f64);
    }

    vec![energy, structures, creeps, creep_cost, minerals]
}
