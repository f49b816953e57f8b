//! User directory: id to display name and the set of rooms of interest.

use std::collections::{BTreeMap, BTreeSet};

use screeps_common::UserRecord;
use tracing::trace;

/// Registered users of one scrape cycle.
///
/// Only users with a non-empty contact address are admitted. Lookups for
/// anything else resolve to an empty display name.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: BTreeMap<String, UserRecord>,
    rooms: BTreeSet<String>,
}

impl Directory {
    /// Build a directory from raw user records.
    ///
    /// When two records share an id the later one wins.
    pub fn load(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let mut directory = Self::default();

        for user in users {
            if !user.has_contact() {
                trace!(user_id = %user.id, "Skipping user without contact address");
                continue;
            }
            directory.users.insert(user.id.clone(), user);
        }

        directory.rooms = directory
            .users
            .values()
            .flat_map(|user| user.owned_rooms.iter())
            .filter(|room| !room.trim().is_empty())
            .cloned()
            .collect();

        directory
    }

    /// Display name for a user id, empty if the id is unknown or unnamed.
    pub fn display_name(&self, user_id: &str) -> &str {
        self.users
            .get(user_id)
            .and_then(|user| user.display_name.as_deref())
            .unwrap_or("")
    }

    /// Union of every admitted user's rooms.
    pub fn all_room_names(&self) -> &BTreeSet<String> {
        &self.rooms
    }

    /// Ids of every admitted user.
    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Every admitted user, ordered by id.
    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserRecord {
        UserRecord::new("u1")
            .with_contact("alice@example.com")
            .with_name("Alice")
            .with_rooms(["W1N1", "W2N1"])
    }

    #[test]
    fn test_display_name_lookup() {
        let directory = Directory::load([alice()]);

        assert_eq!(directory.display_name("u1"), "Alice");
        assert_eq!(directory.display_name("nobody"), "");
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_users_without_contact_are_excluded() {
        let empty = UserRecord::new("u2").with_contact("").with_name("Bob");
        let missing = UserRecord::new("u3").with_name("Carol").with_rooms(["W9N9"]);

        let directory = Directory::load([alice(), empty, missing]);

        assert_eq!(directory.display_name("u2"), "");
        assert_eq!(directory.display_name("u3"), "");
        assert!(!directory.all_room_names().contains("W9N9"));
        assert_eq!(directory.user_ids().collect::<Vec<_>>(), vec!["u1"]);
    }

    #[test]
    fn test_room_union_is_deduplicated() {
        let other = UserRecord::new("u2")
            .with_contact("b@example.com")
            .with_name("Bob")
            .with_rooms(["W2N1", "E1S1"]);

        let directory = Directory::load([alice(), other]);

        let rooms: Vec<&str> = directory.all_room_names().iter().map(String::as_str).collect();
        assert_eq!(rooms, vec!["E1S1", "W1N1", "W2N1"]);
    }

    #[test]
    fn test_unnamed_user_resolves_blank() {
        let directory = Directory::load([UserRecord::new("u9").with_contact("x@y.z")]);

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.display_name("u9"), "");
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let renamed = alice().with_name("Alicia");
        let directory = Directory::load([alice(), renamed]);

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.display_name("u1"), "Alicia");
    }

    #[test]
    fn test_empty_directory() {
        let directory = Directory::load(Vec::<UserRecord>::new());
        assert!(directory.is_empty());
        assert!(directory.all_room_names().is_empty());
    }
}
