//! Screeps Exporter Common Library
//!
//! Shared types and utilities for the Screeps world-state exporter:
//!
//! - [`world`] - Typed user and room-object records parsed from raw documents
//! - [`logging`] - Logging configuration and subscriber setup
//! - [`error`] - Error types

pub mod error;
pub mod logging;
pub mod world;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
pub use logging::{LogFormat, LoggingConfig, init_tracing};
pub use world::{
    BodyPart, ENERGY, ResourceStore, UserRecord, WorldObject, current_timestamp_millis,
};
