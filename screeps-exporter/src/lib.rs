//! Prometheus metrics exporter for Screeps world state.
//!
//! Every scrape reads the registered users and their room objects from the
//! game database, aggregates them per user and room, and publishes the result
//! as labeled gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │    MongoDB      │────>│   Aggregation   │────>│   MetricSink    │────>│   HTTP Server   │
//! │ users, objects  │     │ (per room/user) │     │ (full replace)  │     │ (/metrics, ...) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! screeps-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod cost;
pub mod cycle;
pub mod directory;
pub mod exposition;
pub mod families;
pub mod http;
pub mod mongo;
pub mod repository;
pub mod sink;

pub use config::ExporterConfig;
pub use cycle::{CycleError, CycleStats, Exporter, SharedExporter};
pub use directory::Directory;
pub use families::{ALL_FAMILIES, MetricGroup, Scope};
pub use http::HttpServer;
pub use mongo::MongoRepository;
pub use repository::{InMemoryRepository, Query, RepositoryError, SnapshotRepository};
pub use sink::{MetricSink, SharedSink};
