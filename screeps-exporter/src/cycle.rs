//! Scrape cycle orchestration.
//!
//! A cycle fetches a fresh snapshot, aggregates it, and replaces the sink
//! families in scope. Nothing is carried between cycles except the sink.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

use crate::aggregate::{RoomAggregates, user_summaries};
use crate::directory::Directory;
use crate::exposition;
use crate::families::{MetricGroup, Scope, room_family_updates, user_family_updates};
use crate::repository::{RepositoryError, SnapshotRepository};
use crate::sink::SharedSink;

/// Errors that abort a scrape cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to fetch users: {0}")]
    FetchUsers(#[source] RepositoryError),

    #[error("Failed to fetch room objects: {0}")]
    FetchObjects(#[source] RepositoryError),

    #[error("Failed to publish metrics: {0}")]
    Sink(#[from] crate::sink::SinkError),

    #[error("Failed to render metrics: {0}")]
    Render(#[from] fmt::Error),
}

/// Counters describing the exporter's own work.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub cycles_started: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    /// Users admitted by the most recent successful cycle.
    pub users_loaded: u64,
    /// Objects aggregated by the most recent successful cycle.
    pub objects_processed: u64,
    pub last_duration: Option<Duration>,
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub generation: u64,
    pub users: usize,
    pub objects: usize,
    pub groups: usize,
}

/// Fetch, aggregate and publish on demand.
pub struct Exporter {
    repository: Arc<dyn SnapshotRepository>,
    sink: SharedSink,
    unknown_user_label: String,
    stats: RwLock<CycleStats>,
}

impl Exporter {
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        sink: SharedSink,
        unknown_user_label: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            sink,
            unknown_user_label: unknown_user_label.into(),
            stats: RwLock::new(CycleStats::default()),
        }
    }

    /// Run one cycle for the families in `scope`.
    ///
    /// On error the sink is left untouched.
    pub async fn refresh(&self, scope: Scope) -> Result<CycleReport, CycleError> {
        self.stats.write().cycles_started += 1;
        let started = Instant::now();

        let result = self
            .run_cycle(scope)
            .instrument(info_span!("cycle", %scope))
            .await;

        let elapsed = started.elapsed();
        let mut stats = self.stats.write();
        stats.last_duration = Some(elapsed);
        match &result {
            Ok(report) => {
                stats.cycles_succeeded += 1;
                stats.users_loaded = report.users as u64;
                stats.objects_processed = report.objects as u64;
                debug!(
                    %scope,
                    generation = report.generation,
                    users = report.users,
                    objects = report.objects,
                    groups = report.groups,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Cycle complete"
                );
            }
            Err(e) => {
                stats.cycles_failed += 1;
                warn!(%scope, error = %e, "Cycle aborted");
            }
        }

        result
    }

    async fn run_cycle(&self, scope: Scope) -> Result<CycleReport, CycleError> {
        let users = self
            .repository
            .fetch_users()
            .await
            .map_err(CycleError::FetchUsers)?;
        let directory = Directory::load(users);

        let mut updates = Vec::new();
        let mut objects = 0;
        let mut groups = 0;

        if scope.includes(MetricGroup::Users) {
            let summaries = user_summaries(&directory, &self.unknown_user_label);
            groups += summaries.len();
            updates.extend(user_family_updates(&summaries));
        }

        if scope.includes(MetricGroup::Rooms) {
            let snapshot = self.fetch_objects(&directory).await?;
            objects = snapshot.len();

            let aggregates = RoomAggregates::compute(&snapshot, &directory);
            groups += aggregates.group_count();
            updates.extend(room_family_updates(&aggregates));
        }

        let generation = self.sink.replace_all(updates)?;

        Ok(CycleReport {
            generation,
            users: directory.len(),
            objects,
            groups,
        })
    }

    async fn fetch_objects(
        &self,
        directory: &Directory,
    ) -> Result<Vec<screeps_common::WorldObject>, CycleError> {
        let user_ids: Vec<String> = directory.user_ids().map(str::to_string).collect();
        let rooms: Vec<String> = directory.all_room_names().iter().cloned().collect();

        if user_ids.is_empty() || rooms.is_empty() {
            debug!(
                users = user_ids.len(),
                rooms = rooms.len(),
                "Nothing to query, skipping object fetch"
            );
            return Ok(Vec::new());
        }

        self.repository
            .fetch_objects(&user_ids, &rooms)
            .await
            .map_err(CycleError::FetchObjects)
    }

    /// Render the published families in `scope`.
    ///
    /// Self-metrics are only included for [`Scope::All`].
    pub fn render(&self, scope: Scope) -> Result<String, CycleError> {
        let snapshot = self.sink.snapshot();
        let stats = match scope {
            Scope::All => Some(self.stats()),
            Scope::Only(_) => None,
        };
        Ok(exposition::render(&snapshot, scope, stats.as_ref())?)
    }

    /// Refresh then render.
    pub async fn scrape(&self, scope: Scope) -> Result<String, CycleError> {
        self.refresh(scope).await?;
        self.render(scope)
    }

    /// Check that the repository answers.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.repository.ping().await
    }

    pub fn stats(&self) -> CycleStats {
        self.stats.read().clone()
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }
}

/// Create a shareable exporter handle.
pub type SharedExporter = Arc<Exporter>;
