//! Error types for locating elements and running the tracker

use thiserror::Error;

/// Why the locator could not produce an element.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Price element not found after trying {tried} selectors and content search")]
    NotFound { tried: usize },
}

/// Tracker-level failures surfaced to the CLI and scheduler.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("No price could be identified in: {0:?}")]
    NoPriceFound(String),

    #[error("Tracked item not found: {0}")]
    ItemNotFound(String),

    #[error("No element on the page contains the selection: {0:?}")]
    SelectionNotFound(String),

    #[error("Invalid import data: {0}")]
    InvalidImport(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
