//! Error handling for the AutoApi generation library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. Schema-resolution anomalies never
//! surface here: the resolver degrades them to `any` typed output instead.
//!
//! # Examples
//!
//! ```
//! use autoapi_core::error::{Error, Result};
//!
//! fn load_model(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(Error::config("model name is empty"));
//!     }
//!     Ok(())
//! }
//! # assert!(load_model("").is_err());
//! ```

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use thiserror::Error;

/// Result type for AutoApi generation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for AutoApi generation operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// HTTP error while fetching project metadata
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Project snapshot error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Formatter error
    #[error("Formatter error: {0}")]
    Format(String),

    /// A user supplied custom strategy snippet failed for one operation
    #[error("Custom strategy failed for {operation}: {message}")]
    CustomStrategy { operation: String, message: String },

    /// Writing or merging a generated file failed
    #[error("Failed to update {}: {source}", path.display())]
    FileUpdate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new snapshot error
    pub fn snapshot<S: Into<String>>(msg: S) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a new formatter error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    /// Create a custom strategy error scoped to one operation
    pub fn custom_strategy(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CustomStrategy {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Attach a file path to an I/O error raised while updating that file
    pub fn file_update(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileUpdate {
            path: path.into(),
            source,
        }
    }
}
