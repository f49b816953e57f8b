//! Typed records for the two document collections the exporter reads.
//!
//! The game server stores users and room objects as schemaless documents.
//! [`UserRecord::from_document`] and [`WorldObject::from_document`] are the
//! only places those documents are inspected; everything downstream works on
//! the typed records. Absent, null or malformed fields read as their zero
//! value, never as an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Resource kind that counts as energy. Every other store key is a mineral.
pub const ENERGY: &str = "energy";

/// Extended-JSON wrappers a numeric field may arrive in.
const EXTENDED_NUMBER_KEYS: [&str; 4] = [
    "$numberInt",
    "$numberLong",
    "$numberDouble",
    "$numberDecimal",
];

/// A registered player as stored in the users collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque user identifier.
    pub id: String,

    /// Registered contact address (e-mail). Users without one are ignored.
    pub contact_address: Option<String>,

    /// Display name shown in metric labels.
    pub display_name: Option<String>,

    /// Rooms the user declares as owned, trimmed-blank-filtered and deduplicated.
    pub owned_rooms: Vec<String>,

    /// CPU used during the last tick.
    pub cpu_used_last_tick: f64,

    /// CPU budget.
    pub cpu_budget_total: f64,

    /// Global control level.
    pub gcl_level: f64,

    /// Credit balance.
    pub currency_balance: f64,
}

impl UserRecord {
    /// Create a user record with only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the contact address.
    pub fn with_contact(mut self, address: impl Into<String>) -> Self {
        self.contact_address = Some(address.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the owned rooms, normalizing them the same way documents are.
    pub fn with_rooms<I, S>(mut self, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owned_rooms = normalize_rooms(rooms.into_iter().map(Into::into));
        self
    }

    /// Whether the user has a present, non-empty contact address.
    pub fn has_contact(&self) -> bool {
        self.contact_address
            .as_deref()
            .is_some_and(|address| !address.is_empty())
    }

    /// Build a record from a raw users-collection document.
    pub fn from_document(doc: &Value) -> Self {
        let owned_rooms = match doc.get("rooms") {
            Some(Value::Array(items)) => {
                normalize_rooms(items.iter().filter_map(|v| text(Some(v))))
            }
            Some(other) => normalize_rooms(text(Some(other))),
            None => Vec::new(),
        };

        Self {
            id: text(doc.get("_id")).unwrap_or_default(),
            contact_address: text(doc.get("email")),
            display_name: text(doc.get("username")),
            owned_rooms,
            cpu_used_last_tick: number(doc.get("lastUsedCpu")),
            cpu_budget_total: number(doc.get("cpu")),
            gcl_level: number(doc.get("gcl")),
            currency_balance: number(doc.get("money")),
        }
    }
}

/// A single body part of a creep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    /// Part kind, e.g. "move" or "work".
    pub kind: String,
}

impl BodyPart {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Resource amounts held by an object, keyed by resource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStore(BTreeMap<String, f64>);

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount, builder style.
    pub fn with(mut self, kind: impl Into<String>, amount: f64) -> Self {
        self.insert(kind, amount);
        self
    }

    pub fn insert(&mut self, kind: impl Into<String>, amount: f64) {
        self.0.insert(kind.into(), amount);
    }

    pub fn get(&self, kind: &str) -> Option<f64> {
        self.0.get(kind).copied()
    }

    /// Whether the store carries an energy entry, even a zero one.
    pub fn has_energy(&self) -> bool {
        self.0.contains_key(ENERGY)
    }

    /// Stored energy, 0 when absent.
    pub fn energy(&self) -> f64 {
        self.get(ENERGY).unwrap_or(0.0)
    }

    /// Every non-energy entry.
    pub fn minerals(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter(|(kind, _)| kind.as_str() != ENERGY)
            .map(|(kind, amount)| (kind.as_str(), *amount))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ResourceStore {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A snapshot of one object in a room: structure, creep, tombstone, etc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: String,

    /// Owning user identifier. May not resolve to a known user.
    pub user_id: String,

    /// Room name, e.g. "W1N1".
    pub room: String,

    /// Object type, e.g. "spawn", "extension", "creep".
    pub kind: String,

    /// Resource store, if the object has one.
    pub store: Option<ResourceStore>,

    /// Body parts; empty for anything that is not creep-like.
    pub body: Vec<BodyPart>,
}

impl WorldObject {
    pub fn new(
        user_id: impl Into<String>,
        room: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            room: room.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_store(mut self, store: ResourceStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_body<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body = parts.into_iter().map(BodyPart::new).collect();
        self
    }

    /// Build an object from a raw room-objects document.
    pub fn from_document(doc: &Value) -> Self {
        let store = doc.get("store").and_then(Value::as_object).map(|map| {
            map.iter()
                .map(|(kind, amount)| (kind.as_str(), number(Some(amount))))
                .collect()
        });

        let body = doc
            .get("body")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .map(|part| BodyPart::new(text(part.get("type")).unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: text(doc.get("_id")).unwrap_or_default(),
            user_id: text(doc.get("user")).unwrap_or_default(),
            room: text(doc.get("room")).unwrap_or_default(),
            kind: text(doc.get("type")).unwrap_or_default(),
            store,
            body,
        }
    }
}

/// Read a field as text. Object ids in `{"$oid": ...}` form are unwrapped.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Read a field as a finite number, 0 otherwise.
fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Object(map)) => EXTENDED_NUMBER_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok()),
        _ => None,
    };

    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn normalize_rooms(rooms: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for room in rooms {
        if room.trim().is_empty() || result.contains(&room) {
            continue;
        }
        result.push(room);
    }
    result
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
