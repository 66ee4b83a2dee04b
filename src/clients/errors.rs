//! Error types for the query pipeline.
//!
//! This module contains error types for transport, decoding and pipeline
//! failures.
//!
//! # Error Handling
//!
//! - [`CodecError`]: A response body could not be decoded
//! - [`TransportError`]: A request could not be completed at the wire level
//! - [`HttpResponseError`]: The remote service answered with a failure status
//! - [`QueryError`]: Unified error type returned by [`ApiClient`](crate::ApiClient)
//!
//! Only [`QueryError`] leaves the pipeline. Expired tokens, a single 401 and
//! verification challenges are recovered inside it and never surface here.
//!
//! # Example
//!
//! ```rust,ignore
//! use tgtg_ant::QueryError;
//!
//! match client.list_stores().await {
//!     Ok(stores) => println!("{} stores", stores.len()),
//!     Err(QueryError::Auth(e)) => eprintln!("cannot authenticate: {e}"),
//!     Err(QueryError::Transport(e)) => eprintln!("network trouble: {e}"),
//!     Err(e) => eprintln!("query failed: {e}"),
//! }
//! ```

use thiserror::Error;

use crate::auth::AuthError;
use crate::clients::codec::ContentEncoding;
use crate::models::ParseError;

/// Error returned when a response body cannot be decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The `Content-Encoding` chain contains a token that is not supported.
    #[error("Unsupported content encoding '{token}'")]
    UnsupportedEncoding {
        /// The offending token.
        token: String,
    },

    /// A layer of the chain could not be decoded.
    #[error("Corrupt {encoding} layer in response body: {source}")]
    Corrupt {
        /// The layer that failed.
        encoding: ContentEncoding,
        /// Underlying decoder error.
        #[source]
        source: std::io::Error,
    },
}

/// Error returned when a request cannot be completed at the wire level.
///
/// These errors are never retried by the pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The request payload could not be serialized.
    #[error("Cannot serialize request payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A wait was interrupted because shutdown was requested.
    #[error("Interrupted by shutdown request")]
    Cancelled,
}

/// Error returned when the remote service answers with a failure status.
#[derive(Debug, Error)]
#[error("HTTP status {code} received from {path}: {body}")]
pub struct HttpResponseError {
    /// The HTTP status code of the response.
    pub code: u16,
    /// The endpoint path that was called.
    pub path: String,
    /// The decoded response body, lossily converted to text.
    pub body: String,
}

/// Unified error type for every pipeline operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Authentication failed permanently.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The call was rejected with 401 again right after a fresh login.
    #[error("Unauthorized twice in a row on {path}; giving up")]
    Unauthorized {
        /// The endpoint path that was called.
        path: String,
    },

    /// Non-success status other than 401.
    #[error(transparent)]
    Status(#[from] HttpResponseError),

    /// Too many verification challenges were met for a single call.
    #[error("Verification challenge still present after {rotations} account rotations on {path}")]
    ChallengeLimit {
        /// The endpoint path that was called.
        path: String,
        /// Number of rotations performed.
        rotations: u32,
    },

    /// Wire-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response payload could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An order was requested for more bags than available.
    #[error("Not enough available bags in store {store_id}: requested {requested}, available {available}")]
    NotEnoughBags {
        /// The store identifier.
        store_id: String,
        /// Requested number of bags.
        requested: u32,
        /// Number of bags available.
        available: u32,
    },
}

impl QueryError {
    /// Returns `true` when the error comes from a shutdown request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Cancelled)
                | Self::Auth(AuthError::Transport(TransportError::Cancelled))
        )
    }
}
