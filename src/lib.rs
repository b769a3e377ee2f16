//! Wipe-Ledger: game-server wipe schedule ingestion
//!
//! This crate pulls Rust server listings from several third-party sources,
//! normalizes each listing into a candidate record, and reconciles those
//! candidates into a SQLite store of servers and weekly wipe schedules.

pub mod config;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Wipe-Ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] source::FetchFailure),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Source '{source_name}' requires credential from environment variable {variable}")]
    MissingCredential {
        source_name: String,
        variable: String,
    },

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Result type alias for Wipe-Ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CandidateServer, ServerRecord, WipeScheduleEntry};
pub use pipeline::{run_source, RunReport};
pub use state::{PipelineState, StopReason};
