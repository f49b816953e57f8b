//! Snapshot source boundary.
//!
//! The exporter only needs two queries: registered users, and the objects
//! those users own in the rooms they declare.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use screeps_common::{UserRecord, WorldObject};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by a repository. Any of them aborts the scrape cycle.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid fixtures: {0}")]
    Fixtures(String),
}

/// Source of per-tick world snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Users with a registered contact address.
    async fn fetch_users(&self) -> Result<Vec<UserRecord>, RepositoryError>;

    /// Objects owned by one of `user_ids` and located in one of `rooms`.
    async fn fetch_objects(
        &self,
        user_ids: &[String],
        rooms: &[String],
    ) -> Result<Vec<WorldObject>, RepositoryError>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// A query a repository answers, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Query {
    Users,
    Objects,
    Ping,
}

impl Query {
    pub const ALL: [Query; 3] = [Query::Users, Query::Objects, Query::Ping];
}

/// Raw documents of both collections, as stored in a fixture file.
#[derive(Debug, Default, Deserialize)]
struct Fixtures {
    #[serde(default)]
    users: Vec<Value>,
    #[serde(default)]
    objects: Vec<Value>,
}

/// Repository backed by in-process records, with the same query semantics as
/// the database one.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<UserRecord>>,
    objects: RwLock<Vec<WorldObject>>,
    failures: RwLock<BTreeMap<Query, String>>,
}

impl InMemoryRepository {
    pub fn new(users: Vec<UserRecord>, objects: Vec<WorldObject>) -> Self {
        Self {
            users: RwLock::new(users),
            objects: RwLock::new(objects),
            failures: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build from raw documents, parsed exactly as database documents are.
    pub fn from_documents(users: &[Value], objects: &[Value]) -> Self {
        Self::new(
            users.iter().map(UserRecord::from_document).collect(),
            objects.iter().map(WorldObject::from_document).collect(),
        )
    }

    /// Load a JSON file of the form `{ "users": [...], "objects": [...] }`
    /// holding raw collection documents.
    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::Fixtures(format!("failed to read '{}': {}", path.display(), e))
        })?;
        let fixtures: Fixtures = serde_json::from_str(&content).map_err(|e| {
            RepositoryError::Fixtures(format!("failed to parse '{}': {}", path.display(), e))
        })?;

        debug!(
            path = %path.display(),
            users = fixtures.users.len(),
            objects = fixtures.objects.len(),
            "Loaded fixture documents"
        );

        Ok(Self::from_documents(&fixtures.users, &fixtures.objects))
    }

    pub fn set_objects(&self, objects: Vec<WorldObject>) {
        *self.objects.write() = objects;
    }

    /// Make every query fail with `reason` until cleared with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        for query in Query::ALL {
            self.set_query_failure(query, reason);
        }
    }

    /// Make one query fail with `reason` until cleared with `None`.
    pub fn set_query_failure(&self, query: Query, reason: Option<&str>) {
        let mut failures = self.failures.write();
        match reason {
            Some(reason) => {
                failures.insert(query, reason.to_string());
            }
            None => {
                failures.remove(&query);
            }
        }
    }

    fn check(&self, query: Query) -> Result<(), RepositoryError> {
        match self.failures.read().get(&query) {
            Some(reason) => Err(RepositoryError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn fetch_users(&self) -> Result<Vec<UserRecord>, RepositoryError> {
        self.check(Query::Users)?;
        Ok(self
            .users
            .read()
            .iter()
            .filter(|user| user.has_contact())
            .cloned()
            .collect())
    }

    async fn fetch_objects(
        &self,
        user_ids: &[String],
        rooms: &[String],
    ) -> Result<Vec<WorldObject>, RepositoryError> {
        self.check(Query::Objects)?;
        Ok(self
            .objects
            .read()
            .iter()
            .filter(|obj| user_ids.contains(&obj.user_id) && rooms.contains(&obj.room))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check(Query::Ping)
    }
}
