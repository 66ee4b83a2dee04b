//! Per-account authentication state.
//!
//! This module provides the [`Session`] type holding the tokens, cookies and
//! device signature used when talking to the remote API on behalf of one
//! account. A `Session` is also the on-disk snapshot format.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication state for one account.
///
/// A session is authenticated once it holds an access token, a refresh token
/// and the remote user id. Two independent windows bound its lifetime: the
/// login window starts at [`logged_in_at`](Self::logged_in_at) and the token
/// window at [`token_refreshed_at`](Self::token_refreshed_at). A window is
/// closed once `now >= start + ttl`.
///
/// The `Debug` output masks both tokens.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use chrono::Utc;
/// use tgtg_ant::Session;
///
/// let mut session = Session::new("TGTG/24.11.0 Dalvik/2.1.0");
/// assert!(!session.is_authenticated());
///
/// let now = Utc::now();
/// session.set_tokens("access", "refresh", now);
/// session.user_id = "42".to_string();
/// session.logged_in_at = Some(now);
///
/// assert!(session.is_authenticated());
/// assert!(session.is_token_valid_at(now, Duration::from_secs(3600)));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token sent with every request.
    #[serde(default)]
    pub access_token: String,

    /// Token exchanged for a new access token when the current one expires.
    #[serde(default)]
    pub refresh_token: String,

    /// Cookies replayed on every request, as received in `Set-Cookie`.
    #[serde(default, rename = "cookie")]
    pub cookies: Vec<String>,

    /// Remote user identifier.
    #[serde(default)]
    pub user_id: String,

    /// Device signature sent as `User-Agent`.
    #[serde(default)]
    pub user_agent: String,

    /// When the email login was last completed.
    #[serde(default, rename = "lastLogInRefreshedTime")]
    pub logged_in_at: Option<DateTime<Utc>>,

    /// When the access token was last issued.
    #[serde(default, rename = "lastTokenRefreshedTime")]
    pub token_refreshed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates an unauthenticated session using the given device signature.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when tokens and user id are all present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty() && !self.user_id.is_empty()
    }

    /// Returns `true` if the login window is still open at `now`.
    #[must_use]
    pub fn is_login_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        window_open(self.logged_in_at, ttl, now)
    }

    /// Returns `true` if the login window is still open.
    #[must_use]
    pub fn is_login_valid(&self, ttl: Duration) -> bool {
        self.is_login_valid_at(Utc::now(), ttl)
    }

    /// Returns `true` if the token window is still open at `now`.
    #[must_use]
    pub fn is_token_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        window_open(self.token_refreshed_at, ttl, now)
    }

    /// Returns `true` if the token window is still open.
    #[must_use]
    pub fn is_token_valid(&self, ttl: Duration) -> bool {
        self.is_token_valid_at(Utc::now(), ttl)
    }

    /// Stores a freshly issued token pair and restarts the token window.
    pub fn set_tokens(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.access_token = access_token.into();
        self.refresh_token = refresh_token.into();
        self.token_refreshed_at = Some(now);
    }

    /// Drops every credential. The device signature is kept.
    pub fn clear(&mut self) {
        *self = Self::new(std::mem::take(&mut self.user_agent));
    }
}

fn window_open(start: Option<DateTime<Utc>>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Some(start) = start else {
        return false;
    };
    // A window too large to represent never closes.
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| start.checked_add_signed(ttl))
        .map_or(true, |end| now < end)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("cookies", &self.cookies.len())
            .field("user_id", &self.user_id)
            .field("user_agent", &self.user_agent)
            .field("logged_in_at", &self.logged_in_at)
            .field("token_refreshed_at", &self.token_refreshed_at)
            .finish()
    }
}

const fn mask(token: &str) -> &'static str {
    if token.is_empty() {
        ""
    } else {
        "*****"
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
