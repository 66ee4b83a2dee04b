//! # tgtg-ant
//!
//! An unattended agent that polls the Too Good To Go mobile API for
//! available surprise bags and reports new listings.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`AntConfig`] and [`AntConfigBuilder`]
//! - Per-account sessions with email login, token refresh and durable
//!   snapshots via [`auth`]
//! - Jittered request pacing and account rotation via [`pacing`]
//! - A resilient query pipeline, [`ApiClient`], that recovers from expired
//!   sessions and verification challenges
//! - Lenient parsers for the records of the remote API via [`models`]
//! - A polling loop, [`Poller`], forwarding changes to a [`Notifier`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use tgtg_ant::{Account, AccountEmail, AntConfig};
//!
//! let config = AntConfig::builder()
//!     .account(Account::new(AccountEmail::new("me@example.com").unwrap()))
//!     .average_requests_period(Duration::from_secs(45))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.accounts().len(), 1);
//! ```
//!
//! ## Polling
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tgtg_ant::{AntConfig, ApiClient, LogNotifier, Poller};
//!
//! let config = Arc::new(AntConfig::from_file("secrets/config.json")?);
//! let cancel = CancellationToken::new();
//! let client = ApiClient::new(config, cancel.clone())?;
//!
//! // Cancel the token from a signal handler to stop the loop.
//! Poller::new(client, LogNotifier).run().await?;
//! ```
//!
//! ## Failure Handling
//!
//! Expired tokens are refreshed, a single 401 triggers a fresh login and one
//! retry, and verification challenges rotate to the next account. Everything
//! else surfaces as a [`QueryError`]: an email without an account, a second
//! 401 in a row, an unsupported response encoding, any other failure status
//! and network errors.

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod pacing;
pub mod poller;

// Re-export public types at crate root for convenience
pub use auth::{AuthError, Session, SessionManager, SnapshotError, SnapshotStore};
pub use config::{
    Account, AccountEmail, AntConfig, AntConfigBuilder, BaseUrl, Endpoints, Location,
    SearchConfig,
};
pub use error::ConfigError;

// Re-export client types
pub use clients::{
    ApiClient, BrowserChallengeHandler, ChallengeHandler, CodecError, HttpResponseError,
    HttpTransport, LogChallengeHandler, QueryError, QueryResult, TransportError,
};

pub use models::{Order, PaymentMethod, PaymentProvider, Store};
pub use poller::{LogNotifier, Notifier, NotifyError, Poller};
