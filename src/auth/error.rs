//! Authentication error types.
//!
//! # Error Types
//!
//! - [`AuthError::AccountNotAssociated`]: The email has no account (permanent)
//! - [`AuthError::UnexpectedState`]: The login response carried an unknown state
//! - [`AuthError::MalformedResponse`]: An auth response could not be understood
//! - [`AuthError::VerificationTimeout`]: The login email was not approved in time
//! - [`AuthError::RefreshFailed`]: The token refresh failed (permanent)
//! - [`AuthError::Status`]: An auth endpoint answered with a failure status
//! - [`AuthError::Challenge`]: An auth endpoint answered with a verification challenge
//! - [`AuthError::Snapshot`]: The session snapshot could not be read
//! - [`AuthError::Transport`]: Wire-level failure
//!
//! # Example
//!
//! ```rust
//! use tgtg_ant::AuthError;
//!
//! let error = AuthError::UnexpectedState {
//!     state: "BANNED".to_string(),
//! };
//! assert!(error.to_string().contains("BANNED"));
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::clients::TransportError;

/// Error raised while reading or writing a session snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File system failure.
    #[error("Snapshot I/O error on {}: {source}", .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The session could not be encoded.
    #[error("Cannot encode session snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur while authenticating an account.
///
/// Only [`AuthError::Challenge`] is recovered by the pipeline (by rotating to
/// another account); every other variant aborts the current call.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The remote service does not know this email.
    #[error("Email {email} does not seem to be associated with an account; retry with another email")]
    AccountNotAssociated {
        /// The account email.
        email: String,
    },

    /// The login response carried a state other than `WAIT` or `TERMS`.
    #[error("Unexpected state '{state}' in login response")]
    UnexpectedState {
        /// The state received.
        state: String,
    },

    /// An auth response could not be understood.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// The endpoint path that was called.
        endpoint: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The login email was not approved before the timeout.
    #[error("Login email for {email} was not validated in time")]
    VerificationTimeout {
        /// The account email.
        email: String,
    },

    /// The token refresh failed.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Box<AuthError>),

    /// An auth endpoint answered with a failure status.
    #[error("HTTP status {code} received from {endpoint}")]
    Status {
        /// The HTTP status code.
        code: u16,
        /// The endpoint path that was called.
        endpoint: String,
    },

    /// An auth endpoint answered with a verification challenge.
    #[error("Verification challenge required: {url}")]
    Challenge {
        /// The challenge URL to solve.
        url: String,
    },

    /// The session snapshot could not be read.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Wire-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// Verify AuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuthError>();
};
