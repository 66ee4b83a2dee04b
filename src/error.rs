//! Configuration error types for the agent.
//!
//! This module contains the error type returned while building or loading
//! the agent configuration.
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. Error messages are designed to be clear and actionable.
//!
//! # Example
//!
//! ```rust
//! use tgtg_ant::{AccountEmail, ConfigError};
//!
//! let result = AccountEmail::new("");
//! assert!(matches!(result, Err(ConfigError::InvalidEmail { .. })));
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Account email is empty or malformed.
    #[error("Invalid account email '{email}'. Expected an address such as 'me@example.com'.")]
    InvalidEmail {
        /// The invalid email that was provided.
        email: String,
    },

    /// No account was configured.
    #[error("At least one account must be configured.")]
    NoAccounts,

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// A duration that must be strictly positive is zero.
    #[error("Duration '{field}' must be greater than zero.")]
    ZeroDuration {
        /// The name of the offending field.
        field: &'static str,
    },

    /// Base URL is invalid.
    #[error("Invalid base URL '{url}'. Please provide an http(s) URL (e.g., 'https://apptoogoodtogo.com/api/').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The configuration file could not be read.
    #[error("Cannot read configuration file {}: {source}", .path.display())]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("Cannot parse configuration file {}: {source}", .path.display())]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Returns `true` when the configuration file does not exist.
    ///
    /// The binary uses this to print a hint about creating one.
    #[must_use]
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
