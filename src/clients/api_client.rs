//! The query pipeline.
//!
//! Every request to the remote API goes through [`ApiClient::call`], which
//! makes sure the active account is authenticated, paces the request, and
//! recovers from the failures that have a known cure:
//!
//! - **401**: the session and its snapshot are dropped, a fresh login is
//!   performed and the call is retried once. A second 401 is fatal.
//! - **Verification challenge**: the challenge URL is handed to the
//!   [`ChallengeHandler`], the pool rotates to the next account and the call
//!   is retried, up to `max_challenge_rotations` times per call.
//!
//! Any other failure status is returned as [`QueryError::Status`] without
//! retry, and network errors propagate as they are.
//!
//! `Set-Cookie` headers replace the account's cookies, except on a 401 or a
//! challenge.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, Session, SessionManager, SessionPolicy, SnapshotError, SnapshotStore};
use crate::clients::challenge::{BrowserChallengeHandler, ChallengeHandler};
use crate::clients::errors::{HttpResponseError, QueryError, TransportError};
use crate::clients::http_client::{device_signature_for, Exchange, HttpTransport};
use crate::clients::http_response::QueryResult;
use crate::config::{Account, AntConfig};
use crate::pacing::{sleep_or_cancel, AccountRotator, ReminderCadence};

/// Outcome of a single attempt of a call.
enum Attempt {
    Done(QueryResult),
    Unauthorized,
    Challenge(String),
}

/// The transport bound to one account's pacing clock.
struct Wire<'a> {
    transport: &'a HttpTransport,
    rotator: &'a mut AccountRotator,
    account: usize,
    cancel: &'a CancellationToken,
}

impl Exchange for Wire<'_> {
    async fn exchange(
        &mut self,
        session: &mut Session,
        path: &str,
        payload: &serde_json::Value,
        allow_sleep: bool,
    ) -> Result<QueryResult, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if allow_sleep {
            self.rotator.pace(self.account, self.cancel).await?;
        }
        let result = self.transport.send(session, path, payload).await?;
        result.record_cookies(session);
        Ok(result)
    }

    async fn pause(&mut self, duration: Duration) -> Result<(), TransportError> {
        sleep_or_cancel(duration, self.cancel).await
    }
}

/// Client for the remote API, driving a pool of accounts.
///
/// Methods take `&mut self`: a client sends one request at a time, so the
/// requests of an account are strictly ordered.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use tgtg_ant::{AntConfig, ApiClient};
///
/// let config = Arc::new(AntConfig::from_file("secrets/config.json")?);
/// let mut client = ApiClient::new(config, CancellationToken::new())?;
///
/// let stores = client.list_stores().await?;
/// client.close()?;
/// ```
pub struct ApiClient {
    pub(crate) config: Arc<AntConfig>,
    transport: HttpTransport,
    sessions: Vec<SessionManager>,
    rotator: AccountRotator,
    pub(crate) reminder: ReminderCadence,
    challenge_handler: Arc<dyn ChallengeHandler>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", self.transport.base_url())
            .field("sessions", &self.sessions)
            .field("rotator", &self.rotator)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for every account of `config`.
    ///
    /// Challenges are opened in the browser by default; see
    /// [`with_challenge_handler`](Self::with_challenge_handler).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the HTTP client cannot be
    /// initialized.
    pub fn new(config: Arc<AntConfig>, cancel: CancellationToken) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config)?;
        let store = SnapshotStore::new(config.snapshot_dir());
        let policy = SessionPolicy::from_config(&config);

        let sessions = config
            .accounts()
            .iter()
            .map(|account| {
                let user_agent = device_signature_for(account, config.apk_version());
                SessionManager::new(account.clone(), user_agent, store.clone(), policy.clone())
            })
            .collect::<Vec<_>>();

        let rotator = AccountRotator::new(
            sessions.len(),
            config.average_requests_period(),
            config.too_many_requests_pause_period(),
        );
        let reminder = ReminderCadence::new(config.active_orders_reminder_period());

        Ok(Self {
            config,
            transport,
            sessions,
            rotator,
            reminder,
            challenge_handler: Arc::new(BrowserChallengeHandler),
            cancel,
        })
    }

    /// Replaces the handler receiving verification challenges.
    #[must_use]
    pub fn with_challenge_handler(mut self, handler: impl ChallengeHandler + 'static) -> Self {
        self.challenge_handler = Arc::new(handler);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AntConfig {
        &self.config
    }

    /// Returns the cancellation token observed by every wait.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the index of the active account.
    #[must_use]
    pub const fn current_account_index(&self) -> usize {
        self.rotator.current()
    }

    /// Returns the active account.
    #[must_use]
    pub fn current_account(&self) -> &Account {
        self.manager(self.rotator.current()).account()
    }

    /// Returns the session of the account at `index`.
    #[must_use]
    pub fn session(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index).map(SessionManager::session)
    }

    /// Returns the session of the active account.
    #[must_use]
    pub fn current_session(&self) -> &Session {
        self.manager(self.rotator.current()).session()
    }

    fn manager(&self, index: usize) -> &SessionManager {
        // The rotator never yields an index outside the pool.
        &self.sessions[index]
    }

    /// Sends `payload` to `path` on behalf of the active account.
    ///
    /// Pacing applies only when `allow_sleep` is set.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the call cannot succeed; see the module
    /// documentation for what is recovered internally.
    pub async fn call(
        &mut self,
        path: &str,
        payload: &serde_json::Value,
        allow_sleep: bool,
    ) -> Result<QueryResult, QueryError> {
        self.call_with(path, |_| payload.clone(), allow_sleep).await
    }

    /// Like [`call`](Self::call), but builds the payload from the session it
    /// is sent with.
    ///
    /// The payload is rebuilt on every retry, so account-specific fields
    /// follow the active account after a rotation.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn call_with<F>(
        &mut self,
        path: &str,
        payload: F,
        allow_sleep: bool,
    ) -> Result<QueryResult, QueryError>
    where
        F: Fn(&Session) -> serde_json::Value,
    {
        let mut unauthorized_retried = false;
        let mut rotations = 0u32;

        loop {
            match self.attempt(path, &payload, allow_sleep).await? {
                Attempt::Done(result) => {
                    if !result.is_ok() {
                        return Err(HttpResponseError {
                            code: result.code,
                            path: result.path.clone(),
                            body: result.text().into_owned(),
                        }
                        .into());
                    }
                    return Ok(result);
                }
                Attempt::Unauthorized => {
                    if unauthorized_retried {
                        return Err(QueryError::Unauthorized {
                            path: path.to_string(),
                        });
                    }
                    unauthorized_retried = true;
                    let index = self.rotator.current();
                    tracing::warn!(
                        "{} rejected the session of {}, logging in again",
                        path,
                        self.manager(index).account().email
                    );
                    self.sessions[index].invalidate();
                }
                Attempt::Challenge(url) => {
                    let max = self.config.max_challenge_rotations();
                    if rotations >= max {
                        return Err(QueryError::ChallengeLimit {
                            path: path.to_string(),
                            rotations,
                        });
                    }
                    rotations += 1;
                    self.challenge_handler.surface(&url);
                    let next = self.rotator.rotate(&self.cancel).await?;
                    tracing::info!(
                        "switched to account {} after challenge {}/{}",
                        self.manager(next).account().email,
                        rotations,
                        max
                    );
                }
            }
        }
    }

    async fn attempt<F>(
        &mut self,
        path: &str,
        payload: &F,
        allow_sleep: bool,
    ) -> Result<Attempt, QueryError>
    where
        F: Fn(&Session) -> serde_json::Value,
    {
        let account = self.rotator.current();
        let Self {
            transport,
            sessions,
            rotator,
            cancel,
            ..
        } = self;
        let manager = &mut sessions[account];
        let mut wire = Wire {
            transport,
            rotator,
            account,
            cancel,
        };

        match manager.ensure_valid(&mut wire).await {
            Ok(()) => {}
            Err(AuthError::Challenge { url }) => return Ok(Attempt::Challenge(url)),
            Err(e) => return Err(e.into()),
        }

        let body = payload(manager.session());
        let result = wire
            .exchange(manager.session_mut(), path, &body, allow_sleep)
            .await?;

        if result.is_unauthorized() {
            return Ok(Attempt::Unauthorized);
        }
        if let Some(url) = result.challenge_url() {
            return Ok(Attempt::Challenge(url));
        }
        Ok(Attempt::Done(result))
    }

    /// Writes the snapshot of every authenticated session.
    ///
    /// Every session is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`SnapshotError`] met.
    pub fn close(&self) -> Result<(), SnapshotError> {
        let mut first_error = None;
        for manager in &self.sessions {
            if let Err(e) = manager.flush() {
                tracing::warn!(
                    "cannot write session snapshot of {}: {}",
                    manager.account().email,
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

// Verify ApiClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ApiClient>();
};
