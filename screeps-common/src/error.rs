use thiserror::Error;

/// Error type for the shared exporter utilities.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
