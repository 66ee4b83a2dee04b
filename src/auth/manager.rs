//! Session lifecycle for one account.
//!
//! [`SessionManager`] makes sure the account holds a usable session before
//! each call: it refreshes expired tokens, restores persisted snapshots, and
//! runs the email login when nothing else works.
//!
//! # Login Flow
//!
//! 1. `auth_by_email` with the device type and email answers `WAIT` with a
//!    polling id (or `TERMS` when the email has no account)
//! 2. `auth_by_request_polling_id` is polled until the user approves the
//!    login email and the response carries the tokens
//! 3. the remote user id is resolved and the snapshot is written

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::auth::{AuthError, Session, SnapshotStore};
use crate::clients::{Exchange, QueryResult, TransportError};
use crate::config::{Account, AntConfig, Endpoints};

/// Device type announced to the login endpoints.
pub const DEVICE_TYPE: &str = "ANDROID";

/// Lifetimes and endpoints governing a session.
#[derive(Clone, Debug)]
pub struct SessionPolicy {
    /// How long a login stays valid.
    pub login_validity: Duration,
    /// How long an access token stays valid.
    pub token_validity: Duration,
    /// Wait between two approval polls.
    pub polling_period: Duration,
    /// How long to wait for the login email to be approved.
    pub verification_timeout: Duration,
    /// Endpoint paths.
    pub endpoints: Endpoints,
}

impl SessionPolicy {
    /// Extracts the session policy from the configuration.
    #[must_use]
    pub fn from_config(config: &AntConfig) -> Self {
        Self {
            login_validity: config.login_validity_duration(),
            token_validity: config.token_validity_duration(),
            polling_period: config.login_polling_period(),
            verification_timeout: config.login_email_validation_timeout(),
            endpoints: config.endpoints().clone(),
        }
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    state: Option<String>,
    polling_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    startup_data: Option<StartupData>,
}

#[derive(Deserialize)]
struct StartupData {
    user: Option<UserInformation>,
}

#[derive(Deserialize)]
struct UserInformation {
    user_id: Option<String>,
    user: Option<Box<UserInformation>>,
}

impl UserInformation {
    fn into_user_id(self) -> Option<String> {
        self.user_id
            .filter(|id| !id.is_empty())
            .or_else(|| self.user.and_then(|user| user.into_user_id()))
    }
}

/// Owns the session of one account and keeps it valid.
#[derive(Debug)]
pub struct SessionManager {
    account: Account,
    session: Session,
    store: SnapshotStore,
    policy: SessionPolicy,
}

impl SessionManager {
    /// Creates a manager with an empty session using `user_agent`.
    #[must_use]
    pub fn new(
        account: Account,
        user_agent: impl Into<String>,
        store: SnapshotStore,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            account,
            session: Session::new(user_agent),
            store,
            policy,
        }
    }

    /// Returns the managed account.
    #[must_use]
    pub const fn account(&self) -> &Account {
        &self.account
    }

    /// Returns the current session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the snapshot store.
    #[must_use]
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Makes sure the session is authenticated with a valid token.
    ///
    /// In order: keeps a valid session, refreshes an expired token, restores
    /// a snapshot whose login window is still open, or logs in again.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Challenge`] when an auth endpoint answers with a
    /// verification challenge, and any other [`AuthError`] when
    /// authentication failed permanently.
    pub(crate) async fn ensure_valid<E: Exchange>(
        &mut self,
        exchange: &mut E,
    ) -> Result<(), AuthError> {
        let now = Utc::now();
        if self.session.is_authenticated() {
            if self.session.is_token_valid_at(now, self.policy.token_validity) {
                return Ok(());
            }
            tracing::info!("access token of {} expired, refreshing", self.account.email);
            return self.refresh(exchange).await;
        }

        if self.restore_snapshot(now)? {
            if self.session.is_token_valid_at(now, self.policy.token_validity) {
                return Ok(());
            }
            tracing::info!("restored access token of {} expired, refreshing", self.account.email);
            return self.refresh(exchange).await;
        }

        self.login(exchange).await
    }

    /// Drops the session and its snapshot so that the next call logs in.
    pub fn invalidate(&mut self) {
        if let Err(e) = self.store.remove(&self.account.email) {
            tracing::warn!("cannot delete session snapshot: {}", e);
        }
        self.session.clear();
    }

    /// Writes the snapshot if the session is authenticated.
    ///
    /// # Errors
    ///
    /// Returns the snapshot error if the file cannot be written.
    pub fn flush(&self) -> Result<(), crate::auth::SnapshotError> {
        if self.session.is_authenticated() {
            self.store.save(&self.account.email, &self.session)?;
        }
        Ok(())
    }

    fn restore_snapshot(&mut self, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let Some(mut snapshot) = self.store.load(&self.account.email)? else {
            return Ok(false);
        };

        if !snapshot.is_authenticated()
            || !snapshot.is_login_valid_at(now, self.policy.login_validity)
        {
            tracing::info!("session snapshot of {} has expired", self.account.email);
            self.invalidate();
            return Ok(false);
        }

        if let Some(user_agent) = &self.account.user_agent {
            snapshot.user_agent.clone_from(user_agent);
        } else if snapshot.user_agent.is_empty() {
            snapshot.user_agent = std::mem::take(&mut self.session.user_agent);
        }
        self.session = snapshot;
        Ok(true)
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.account.email, &self.session) {
            tracing::warn!("cannot write session snapshot: {}", e);
        }
    }

    async fn refresh<E: Exchange>(&mut self, exchange: &mut E) -> Result<(), AuthError> {
        match self.refresh_tokens(exchange).await {
            Ok(()) => {
                self.persist();
                Ok(())
            }
            Err(e @ (AuthError::Challenge { .. } | AuthError::Transport(TransportError::Cancelled))) => {
                Err(e)
            }
            Err(e) => Err(AuthError::RefreshFailed(Box::new(e))),
        }
    }

    async fn refresh_tokens<E: Exchange>(&mut self, exchange: &mut E) -> Result<(), AuthError> {
        let endpoint = self.policy.endpoints.refresh_token.clone();
        let payload = json!({ "refresh_token": self.session.refresh_token });
        let result = exchange
            .exchange(&mut self.session, &endpoint, &payload, true)
            .await?;
        check(&result)?;

        let (access_token, refresh_token) = tokens(&result)?.0;
        self.session.set_tokens(access_token, refresh_token, Utc::now());
        tracing::info!("refreshed access token of {}", self.account.email);
        Ok(())
    }

    async fn login<E: Exchange>(&mut self, exchange: &mut E) -> Result<(), AuthError> {
        tracing::info!("logging in {}", self.account.email);
        self.session.clear();

        let endpoint = self.policy.endpoints.auth_by_email.clone();
        let payload = json!({
            "device_type": DEVICE_TYPE,
            "email": self.account.email,
        });
        let result = exchange
            .exchange(&mut self.session, &endpoint, &payload, true)
            .await?;
        check(&result)?;

        let response: LoginResponse =
            serde_json::from_slice(&result.body).map_err(|e| malformed(&endpoint, e))?;

        match response.state.as_deref() {
            Some("WAIT") => {
                let polling_id = response
                    .polling_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| malformed(&endpoint, "missing polling_id"))?;
                self.await_approval(exchange, &polling_id).await
            }
            Some("TERMS") => Err(AuthError::AccountNotAssociated {
                email: self.account.email.to_string(),
            }),
            Some(state) => Err(AuthError::UnexpectedState {
                state: state.to_string(),
            }),
            None => Err(malformed(&endpoint, "missing state")),
        }
    }

    async fn await_approval<E: Exchange>(
        &mut self,
        exchange: &mut E,
        polling_id: &str,
    ) -> Result<(), AuthError> {
        let deadline = Instant::now() + self.policy.verification_timeout;
        tracing::info!(
            "check the {} inbox and validate the login link within {}",
            self.account.email,
            humantime::format_duration(self.policy.verification_timeout)
        );

        let endpoint = self.policy.endpoints.auth_by_request_polling_id.clone();
        let payload = json!({
            "device_type": DEVICE_TYPE,
            "email": self.account.email,
            "request_polling_id": polling_id,
        });

        let mut attempt = 0u32;
        let result = loop {
            if attempt > 0 {
                exchange.pause(self.policy.polling_period).await?;
            }
            attempt += 1;

            let result = exchange
                .exchange(&mut self.session, &endpoint, &payload, false)
                .await?;
            check(&result)?;
            if !result.is_empty() {
                break result;
            }
            if Instant::now() >= deadline {
                return Err(AuthError::VerificationTimeout {
                    email: self.account.email.to_string(),
                });
            }
            tracing::debug!("login of {} not validated yet (check {})", self.account.email, attempt);
        };

        let ((access_token, refresh_token), user_id) = tokens(&result)?;
        let now = Utc::now();
        self.session.set_tokens(access_token, refresh_token, now);
        self.session.user_id = match user_id {
            Some(user_id) => user_id,
            None => self.resolve_user_id(exchange).await?,
        };
        self.session.logged_in_at = Some(now);

        self.persist();
        tracing::info!("logged in {} successfully", self.account.email);
        Ok(())
    }

    async fn resolve_user_id<E: Exchange>(&mut self, exchange: &mut E) -> Result<String, AuthError> {
        let endpoint = self.policy.endpoints.user_information.clone();
        let result = exchange
            .exchange(&mut self.session, &endpoint, &json!({}), false)
            .await?;
        check(&result)?;

        let info: UserInformation =
            serde_json::from_slice(&result.body).map_err(|e| malformed(&endpoint, e))?;
        info.into_user_id()
            .ok_or_else(|| malformed(&endpoint, "missing user_id"))
    }
}

fn malformed(endpoint: &str, reason: impl ToString) -> AuthError {
    AuthError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}

/// Maps challenges and failure statuses of an auth response to errors.
fn check(result: &QueryResult) -> Result<(), AuthError> {
    if let Some(url) = result.challenge_url() {
        return Err(AuthError::Challenge { url });
    }
    if !result.is_ok() {
        return Err(AuthError::Status {
            code: result.code,
            endpoint: result.path.clone(),
        });
    }
    Ok(())
}

type TokenPair = (String, String);

/// Extracts the token pair, and the user id when the response carries it.
fn tokens(result: &QueryResult) -> Result<(TokenPair, Option<String>), AuthError> {
    let response: TokenResponse =
        serde_json::from_slice(&result.body).map_err(|e| malformed(&result.path, e))?;

    let access_token = response
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| malformed(&result.path, "missing access_token"))?;
    let refresh_token = response
        .refresh_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| malformed(&result.path, "missing refresh_token"))?;
    let user_id = response
        .startup_data
        .and_then(|data| data.user)
        .and_then(UserInformation::into_user_id);

    Ok(((access_token, refresh_token), user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountEmail;
    use std::collections::VecDeque;

    /// Replays scripted responses and records what was sent.
    #[derive(Default)]
    struct ScriptedExchange {
        responses: VecDeque<QueryResult>,
        sent: Vec<(String, serde_json::Value, bool)>,
        pauses: Vec<Duration>,
    }

    impl ScriptedExchange {
        fn reply(mut self, code: u16, body: &str) -> Self {
            self.responses.push_back(QueryResult::new(code, body, ""));
            self
        }

        fn paths(&self) -> Vec<&str> {
            self.sent.iter().map(|(path, _, _)| path.as_str()).collect()
        }
    }

    impl Exchange for ScriptedExchange {
        async fn exchange(
            &mut self,
            _session: &mut Session,
            path: &str,
            payload: &serde_json::Value,
            allow_sleep: bool,
        ) -> Result<QueryResult, TransportError> {
            self.sent.push((path.to_string(), payload.clone(), allow_sleep));
            let mut result = self
                .responses
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request to {path}"));
            result.path = path.to_string();
            Ok(result)
        }

        async fn pause(&mut self, duration: Duration) -> Result<(), TransportError> {
            self.pauses.push(duration);
            Ok(())
        }
    }

    const TOKENS: &str = r#"{"access_token":"access","refresh_token":"refresh","access_token_ttl_seconds":172800}"#;

    fn policy() -> SessionPolicy {
        SessionPolicy {
            login_validity: Duration::from_secs(48 * 3600),
            token_validity: Duration::from_secs(8 * 3600),
            polling_period: Duration::from_secs(15),
            verification_timeout: Duration::from_secs(60),
            endpoints: Endpoints::default(),
        }
    }

    fn manager(dir: &std::path::Path) -> SessionManager {
        let account = Account::new(AccountEmail::new("me@example.com").unwrap());
        SessionManager::new(account, "ua", SnapshotStore::new(dir), policy())
    }

    fn authenticated_session(logged_in_at: DateTime<Utc>, refreshed_at: DateTime<Utc>) -> Session {
        let mut session = Session::new("snapshot-ua");
        session.set_tokens("old-access", "old-refresh", refreshed_at);
        session.user_id = "42".to_string();
        session.logged_in_at = Some(logged_in_at);
        session
    }

    #[tokio::test]
    async fn test_login_polls_until_tokens_arrive() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut exchange = ScriptedExchange::default()
            .reply(200, r#"{"state":"WAIT","polling_id":"poll-1"}"#)
            .reply(200, "")
            .reply(200, "")
            .reply(200, TOKENS)
            .reply(200, r#"{"user_id":"1234"}"#);

        manager.ensure_valid(&mut exchange).await.unwrap();

        let session = manager.session();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token, "access");
        assert_eq!(session.user_id, "1234");
        assert!(session.logged_in_at.is_some());
        assert_eq!(
            exchange.paths(),
            vec![
                "auth/v4/authByEmail",
                "auth/v4/authByRequestPollingId",
                "auth/v4/authByRequestPollingId",
                "auth/v4/authByRequestPollingId",
                "user/v2",
            ]
        );
        assert_eq!(exchange.pauses, vec![Duration::from_secs(15); 2]);
        assert_eq!(
            exchange.sent[1].1,
            json!({"device_type": "ANDROID", "email": "me@example.com", "request_polling_id": "poll-1"})
        );
        assert!(manager.store().path_for(&manager.account().email).exists());
    }

    #[tokio::test]
    async fn test_login_uses_user_id_from_startup_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut exchange = ScriptedExchange::default()
            .reply(200, r#"{"state":"WAIT","polling_id":"poll-1"}"#)
            .reply(
                200,
                r#"{"access_token":"a","refresh_token":"r","startup_data":{"user":{"user_id":"77"}}}"#,
            );

        manager.ensure_valid(&mut exchange).await.unwrap();
        assert_eq!(manager.session().user_id, "77");
        assert_eq!(exchange.sent.len(), 2);
    }

    #[tokio::test]
    async fn test_terms_state_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut exchange = ScriptedExchange::default().reply(200, r#"{"state":"TERMS"}"#);

        let result = manager.ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::AccountNotAssociated { email }) if email == "me@example.com"));
    }

    #[tokio::test]
    async fn test_unknown_state_is_unexpected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut exchange = ScriptedExchange::default().reply(200, r#"{"state":"BANNED"}"#);

        let result = manager.ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::UnexpectedState { state }) if state == "BANNED"));
    }

    #[tokio::test]
    async fn test_missing_state_or_polling_id_is_malformed() {
        let dir = tempfile::tempdir().unwrap();

        let mut exchange = ScriptedExchange::default().reply(200, r#"{"foo":"bar"}"#);
        let result = manager(dir.path()).ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::MalformedResponse { .. })));

        let mut exchange = ScriptedExchange::default().reply(200, r#"{"state":"WAIT"}"#);
        let result = manager(dir.path()).ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_polling_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        manager.policy.verification_timeout = Duration::ZERO;
        let mut exchange = ScriptedExchange::default()
            .reply(200, r#"{"state":"WAIT","polling_id":"poll-1"}"#)
            .reply(200, "");

        let result = manager.ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::VerificationTimeout { .. })));
        assert!(!manager.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_challenge_during_login_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut exchange = ScriptedExchange::default()
            .reply(403, r#"{"url":"https://geo.captcha-delivery.com/captcha/?x=1"}"#);

        let result = manager.ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::Challenge { url }) if url.ends_with("x=1")));
    }

    #[tokio::test]
    async fn test_valid_session_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        manager.session = authenticated_session(now, now);

        let mut exchange = ScriptedExchange::default();
        manager.ensure_valid(&mut exchange).await.unwrap();
        assert!(exchange.sent.is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        manager.session = authenticated_session(now, now - chrono::Duration::hours(8));

        let mut exchange = ScriptedExchange::default().reply(200, TOKENS);
        manager.ensure_valid(&mut exchange).await.unwrap();

        assert_eq!(exchange.paths(), vec!["auth/v3/token/refresh"]);
        assert_eq!(exchange.sent[0].1, json!({"refresh_token": "old-refresh"}));
        assert_eq!(manager.session().access_token, "access");
        assert_eq!(manager.session().refresh_token, "refresh");
        assert!(manager.session().is_token_valid(policy().token_validity));
        assert!(manager.store().load(&manager.account().email).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        manager.session = authenticated_session(now, now - chrono::Duration::hours(9));

        let mut exchange = ScriptedExchange::default().reply(500, "oops");
        let result = manager.ensure_valid(&mut exchange).await;
        assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_valid_snapshot_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        let snapshot = authenticated_session(now, now);
        manager.store.save(&manager.account.email, &snapshot).unwrap();

        let mut exchange = ScriptedExchange::default();
        manager.ensure_valid(&mut exchange).await.unwrap();

        assert!(exchange.sent.is_empty());
        assert_eq!(manager.session().access_token, "old-access");
        assert_eq!(manager.session().user_agent, "snapshot-ua");
    }

    #[tokio::test]
    async fn test_snapshot_with_expired_token_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        let snapshot = authenticated_session(now, now - chrono::Duration::hours(10));
        manager.store.save(&manager.account.email, &snapshot).unwrap();

        let mut exchange = ScriptedExchange::default().reply(200, TOKENS);
        manager.ensure_valid(&mut exchange).await.unwrap();

        assert_eq!(exchange.paths(), vec!["auth/v3/token/refresh"]);
        assert_eq!(manager.session().access_token, "access");
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let old = Utc::now() - chrono::Duration::hours(49);
        let snapshot = authenticated_session(old, old);
        manager.store.save(&manager.account.email, &snapshot).unwrap();

        let mut exchange = ScriptedExchange::default().reply(200, r#"{"state":"TERMS"}"#);
        let result = manager.ensure_valid(&mut exchange).await;

        assert!(matches!(result, Err(AuthError::AccountNotAssociated { .. })));
        assert_eq!(exchange.paths(), vec!["auth/v4/authByEmail"]);
        assert!(!manager.store().path_for(&manager.account().email).exists());
    }

    #[test]
    fn test_invalidate_clears_session_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let now = Utc::now();
        manager.session = authenticated_session(now, now);
        manager.flush().unwrap();
        assert!(manager.store().path_for(&manager.account().email).exists());

        manager.invalidate();
        assert!(!manager.session().is_authenticated());
        assert!(!manager.store().path_for(&manager.account().email).exists());
    }

    #[test]
    fn test_flush_skips_anonymous_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.flush().unwrap();
        assert!(!manager.store().path_for(&manager.account().email).exists());
    }
}
