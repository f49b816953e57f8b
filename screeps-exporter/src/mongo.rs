//! MongoDB-backed snapshot repository.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use screeps_common::{UserRecord, WorldObject};
use tracing::{debug, info};

use crate::config::MongoConfig;
use crate::repository::{RepositoryError, SnapshotRepository};

const APP_NAME: &str = "screeps-exporter";

/// Repository reading the game server's users and room-objects collections.
#[derive(Debug, Clone)]
pub struct MongoRepository {
    client: Client,
    database: Database,
    users: Collection<Document>,
    objects: Collection<Document>,
}

impl MongoRepository {
    /// Create the client and its connection pool.
    ///
    /// The driver connects lazily; use [`SnapshotRepository::ping`] to verify
    /// the server is reachable.
    pub async fn connect(config: &MongoConfig) -> Result<Self, RepositoryError> {
        let mut options = ClientOptions::parse(&config.url).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.max_idle_time = Some(config.max_idle_time());
        options.connect_timeout = Some(config.connect_timeout());
        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.retry_reads = Some(true);
        options.retry_writes = Some(true);

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        info!(
            database = %config.database,
            max_pool_size = config.max_pool_size,
            "MongoDB client created"
        );

        Ok(Self {
            users: database.collection(&config.users_collection),
            objects: database.collection(&config.objects_collection),
            database,
            client,
        })
    }

    /// Close every pooled connection.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("MongoDB connection closed");
    }
}

/// Users with an `email` that is present and neither null nor empty.
fn users_filter() -> Document {
    doc! { "email": { "$exists": true, "$nin": [Bson::Null, ""] } }
}

fn users_projection() -> Document {
    doc! {
        "_id": 1,
        "email": 1,
        "username": 1,
        "rooms": 1,
        "lastUsedCpu": 1,
        "cpu": 1,
        "gcl": 1,
        "money": 1,
    }
}

fn objects_filter(user_ids: &[String], rooms: &[String]) -> Document {
    doc! {
        "user": { "$in": user_ids.to_vec() },
        "room": { "$in": rooms.to_vec() },
    }
}

/// Convert a driver document into the JSON shape records are parsed from.
fn to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

#[async_trait]
impl SnapshotRepository for MongoRepository {
    async fn fetch_users(&self) -> Result<Vec<UserRecord>, RepositoryError> {
        let cursor = self
            .users
            .find(users_filter())
            .projection(users_projection())
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        debug!(count = documents.len(), "Fetched user documents");

        Ok(documents
            .into_iter()
            .map(|d| UserRecord::from_document(&to_json(d)))
            .collect())
    }

    async fn fetch_objects(
        &self,
        user_ids: &[String],
        rooms: &[String],
    ) -> Result<Vec<WorldObject>, RepositoryError> {
        let cursor = self.objects.find(objects_filter(user_ids, rooms)).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        debug!(
            count = documents.len(),
            users = user_ids.len(),
            rooms = rooms.len(),
            "Fetched room object documents"
        );

        Ok(documents
            .into_iter()
            .map(|d| WorldObject::from_document(&to_json(d)))
            .collect())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
