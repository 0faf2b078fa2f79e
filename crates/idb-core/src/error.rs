//! Error types for the IDB reconciliation system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for IDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the IDB reconciliation system
#[derive(Error, Debug)]
pub enum Error {
    /// A zone block is missing a required key or carries an unusable value
    #[error("Invalid zone configuration: {key}")]
    InvalidZoneConfig {
        /// Offending key (dotted path inside the zone block)
        key: String,
    },

    /// The zone's driver name is absent or not supported
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// Configuration errors outside of a single zone block
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider driver errors (connect, list, identity)
    #[error("Driver error ({driver}): {message}")]
    Driver {
        /// Driver name
        driver: String,
        /// Error message
        message: String,
    },

    /// Inventory backend errors (non-2xx, unexpected body)
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O errors (config files, driver subprocesses)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid zone configuration error for `key`
    pub fn invalid_zone_config(key: impl Into<String>) -> Self {
        Self::InvalidZoneConfig { key: key.into() }
    }

    /// Create an unknown driver error
    pub fn unknown_driver(name: impl Into<String>) -> Self {
        Self::UnknownDriver(name.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a driver error
    pub fn driver(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            driver: driver.into(),
            message: message.into(),
        }
    }

    /// Create an inventory backend error
    pub fn inventory(msg: impl Into<String>) -> Self {
        Self::Inventory(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error comes from configuration rather than runtime I/O
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidZoneConfig { .. } | Self::UnknownDriver(_) | Self::Config(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
