//! Authentication for the remote API.
//!
//! This module owns the per-account session state and everything needed to
//! keep it usable across restarts.
//!
//! # Overview
//!
//! - [`Session`]: Tokens, cookies and validity timestamps of one account
//! - [`SessionManager`]: Refreshes, restores or re-creates a session on demand
//! - [`SessionPolicy`]: Lifetimes and endpoints the manager works with
//! - [`SnapshotStore`]: Durable per-account session snapshots
//! - [`AuthError`] and [`SnapshotError`]: What can go wrong
//!
//! # Validity Windows
//!
//! A session has two independent windows. The login window starts at the
//! last email login and bounds how long a snapshot may be restored; the token
//! window starts at the last token refresh and bounds how long the access
//! token is sent as is. Both are closed at `start + ttl` exactly.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use chrono::Utc;
//! use tgtg_ant::Session;
//!
//! let mut session = Session::new("TGTG/24.11.0 Dalvik/2.1.0");
//! assert!(!session.is_authenticated());
//!
//! session.set_tokens("access", "refresh", Utc::now());
//! session.user_id = "1234".to_string();
//! assert!(session.is_authenticated());
//! assert!(session.is_token_valid(Duration::from_secs(3600)));
//! ```

mod error;
mod manager;
mod session;
mod snapshot;

pub use error::{AuthError, SnapshotError};
pub use manager::{SessionManager, SessionPolicy, DEVICE_TYPE};
pub use session::Session;
pub use snapshot::SnapshotStore;
