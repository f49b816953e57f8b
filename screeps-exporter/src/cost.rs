//! Static body-part cost table.

use std::str::FromStr;

use screeps_common::BodyPart;

/// A creep body part kind with a known spawn cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyPartKind {
    Move,
    Work,
    Carry,
    Attack,
    RangedAttack,
    Heal,
    Claim,
    Tough,
}

impl BodyPartKind {
    /// Every part kind in the table.
    pub const ALL: [BodyPartKind; 8] = [
        BodyPartKind::Move,
        BodyPartKind::Work,
        BodyPartKind::Carry,
        BodyPartKind::Attack,
        BodyPartKind::RangedAttack,
        BodyPartKind::Heal,
        BodyPartKind::Claim,
        BodyPartKind::Tough,
    ];

    /// Name as stored in creep documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPartKind::Move => "move",
            BodyPartKind::Work => "work",
            BodyPartKind::Carry => "carry",
            BodyPartKind::Attack => "attack",
            BodyPartKind::RangedAttack => "ranged_attack",
            BodyPartKind::Heal => "heal",
            BodyPartKind::Claim => "claim",
            BodyPartKind::Tough => "tough",
        }
    }

    /// Spawn cost in energy points.
    pub const fn cost(self) -> u64 {
        match self {
            BodyPartKind::Move => 50,
            BodyPartKind::Work => 100,
            BodyPartKind::Carry => 50,
            BodyPartKind::Attack => 80,
            BodyPartKind::RangedAttack => 150,
            BodyPartKind::Heal => 250,
            BodyPartKind::Claim => 600,
            BodyPartKind::Tough => 10,
        }
    }
}

/// Error returned when a part name is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown body part: {0}")]
pub struct UnknownBodyPart(pub String);

impl FromStr for BodyPartKind {
    type Err = UnknownBodyPart;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BodyPartKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownBodyPart(s.to_string()))
    }
}

/// Cost of a single part by name. Unknown kinds cost nothing.
pub fn part_cost(kind: &str) -> u64 {
    kind.parse::<BodyPartKind>().map(BodyPartKind::cost).unwrap_or(0)
}

/// Total spawn cost of a body.
pub fn body_cost(body: &[BodyPart]) -> u64 {
    body.iter().map(|part| part_cost(&part.kind)).sum()
}
