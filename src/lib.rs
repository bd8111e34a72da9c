//! ria-harvest: parallel vehicle-listing harvester
//!
//! This crate crawls a classifieds site in page-range chunks, one isolated
//! worker process per chunk, reveals seller phone numbers through a browser
//! session, merges the per-chunk artifacts and upserts the result into SQLite.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod reveal;
pub mod schedule;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for ria-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] pipeline::ArtifactError),

    #[error("Scheduling error: {0}")]
    Scheduler(#[from] pipeline::SchedulerError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted before completion")]
    Interrupted,
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

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for ria-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{ChunkJob, VehicleRecord};
