//! Configuration module for Wipe-Ledger
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving source credentials from the environment.
//!
//! # Example
//!
//! ```no_run
//! use wipe_ledger::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ledger.toml")).unwrap();
//! println!("Configured sources: {}", config.sources.len());
//! ```

mod credentials;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ClientConfig, Config, SourceConfig, SourceKind, StoreConfig};

// Re-export parser functions
pub use credentials::{resolve_credentials, Credentials};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
