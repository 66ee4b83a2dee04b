//! Client layer for the remote API.
//!
//! This module provides everything between a high-level operation such as
//! "list stores" and the bytes on the wire.
//!
//! # Overview
//!
//! - [`ApiClient`]: The query pipeline and the operations built on it
//! - [`HttpTransport`]: One POST with the standard headers, no retries
//! - [`QueryResult`]: A decoded response
//! - [`codec`]: Decoding of chained `Content-Encoding` bodies
//! - [`ChallengeHandler`]: Where verification challenges are surfaced
//!
//! # Error Handling
//!
//! Every operation returns [`QueryError`]. Wire-level failures are
//! [`TransportError`], which also carries [`CodecError`] and shutdown
//! requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tgtg_ant::{AntConfig, ApiClient, LogChallengeHandler};
//!
//! let config = Arc::new(AntConfig::from_file("secrets/config.json")?);
//! let mut client = ApiClient::new(config, CancellationToken::new())?
//!     .with_challenge_handler(LogChallengeHandler);
//!
//! for store in client.list_stores().await? {
//!     println!("{store}");
//! }
//! ```

mod api_client;
mod challenge;
pub mod codec;
mod errors;
mod http_client;
mod http_response;
mod operations;

pub use api_client::ApiClient;
pub use challenge::{BrowserChallengeHandler, ChallengeHandler, LogChallengeHandler};
pub use codec::ContentEncoding;
pub use errors::{CodecError, HttpResponseError, QueryError, TransportError};
pub use http_client::{device_signature_for, device_signatures, HttpTransport, DALVIK_VERSION};
pub use http_response::{QueryResult, CHALLENGE_URL_PREFIX};

pub(crate) use http_client::Exchange;
