//! Configuration types for the agent.
//!
//! This module provides the immutable configuration shared by every part of
//! the agent: the account pool, request pacing, session lifetimes, search
//! parameters and remote endpoints.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`AntConfig`]: The main configuration struct holding all agent settings
//! - [`AntConfigBuilder`]: A builder for constructing [`AntConfig`] instances
//! - [`Account`] and [`AccountEmail`]: The account pool
//! - [`BaseUrl`]: A validated base URL for the remote API
//! - [`Endpoints`]: The versioned endpoint paths of the remote API
//! - [`SearchConfig`]: Where and what to search
//!
//! Configuration files are loaded with [`AntConfig::from_file`].
//!
//! # Example
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

mod file;
mod newtypes;

pub use newtypes::{Account, AccountEmail, BaseUrl};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default base URL of the remote API.
pub const DEFAULT_BASE_URL: &str = "https://apptoogoodtogo.com/api/";

/// Default application version advertised in device signatures.
pub const DEFAULT_APK_VERSION: &str = "24.11.0";

/// Default directory holding session snapshots.
pub const DEFAULT_SNAPSHOT_DIR: &str = "secrets";

/// Versioned endpoint paths of the remote API, relative to the base URL.
///
/// Paths containing `{id}` are templates filled by [`Endpoints::with_id`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoints {
    /// Email-based login.
    pub auth_by_email: String,
    /// Login completion polling.
    pub auth_by_request_polling_id: String,
    /// Token refresh.
    pub refresh_token: String,
    /// User information lookup.
    pub user_information: String,
    /// Item (store) search.
    pub items: String,
    /// Active orders listing.
    pub active_orders: String,
    /// Payment methods listing.
    pub payment_methods: String,
    /// Order creation for an item.
    pub create_order: String,
    /// Order cancellation.
    pub abort_order: String,
    /// Order payment.
    pub pay_order: String,
    /// Payment status lookup.
    pub payment_status: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_by_email: "auth/v4/authByEmail".to_string(),
            auth_by_request_polling_id: "auth/v4/authByRequestPollingId".to_string(),
            refresh_token: "auth/v3/token/refresh".to_string(),
            user_information: "user/v2".to_string(),
            items: "item/v7/".to_string(),
            active_orders: "order/v7/active".to_string(),
            payment_methods: "paymentMethod/v1/".to_string(),
            create_order: "order/v7/create/{id}".to_string(),
            abort_order: "order/v7/{id}/abort".to_string(),
            pay_order: "order/v7/{id}/pay".to_string(),
            payment_status: "payment/v3/{id}".to_string(),
        }
    }
}

impl Endpoints {
    /// Fills the `{id}` placeholder of an endpoint template.
    #[must_use]
    pub fn with_id(template: &str, id: &str) -> String {
        template.replace("{id}", id)
    }
}

/// A geographic location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Store search parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Search origin.
    pub origin: Location,
    /// Search radius in kilometers.
    pub radius_in_km: u32,
    /// Maximum number of results per query.
    pub nb_max_results: u32,
    /// Only return favorite stores.
    pub favorites_only: bool,
    /// Only return stores with stock.
    pub with_stock_only: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            origin: Location::default(),
            radius_in_km: 3,
            nb_max_results: 20,
            favorites_only: true,
            with_stock_only: true,
        }
    }
}

/// Configuration for the agent.
///
/// This struct is immutable once built and is shared (behind an `Arc`) by
/// the query pipeline and every per-account session manager.
///
/// # Thread Safety
///
/// `AntConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug)]
pub struct AntConfig {
    accounts: Vec<Account>,
    language: String,
    base_url: BaseUrl,
    endpoints: Endpoints,
    average_requests_period: Duration,
    too_many_requests_pause_period: Duration,
    active_orders_reminder_period: Duration,
    login_polling_period: Duration,
    login_email_validation_timeout: Duration,
    login_validity_duration: Duration,
    token_validity_duration: Duration,
    request_timeout: Duration,
    search: SearchConfig,
    apk_version: String,
    use_gzip_encoding: bool,
    snapshot_dir: PathBuf,
    max_challenge_rotations: u32,
    verbose: bool,
}

impl AntConfig {
    /// Creates a new builder for constructing an `AntConfig`.
    #[must_use]
    pub fn builder() -> AntConfigBuilder {
        AntConfigBuilder::new()
    }

    /// Loads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the file
    /// cannot be read or decoded, and any validation error of
    /// [`AntConfigBuilder::build`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        file::load(path.as_ref())
    }

    /// Returns the account pool, in rotation order.
    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Returns the `Accept-Language` value.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns the base URL of the remote API.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the endpoint paths.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the average period between two requests of one account.
    #[must_use]
    pub const fn average_requests_period(&self) -> Duration {
        self.average_requests_period
    }

    /// Returns the cooldown applied when account rotation wraps around.
    #[must_use]
    pub const fn too_many_requests_pause_period(&self) -> Duration {
        self.too_many_requests_pause_period
    }

    /// Returns the minimum period between two open-orders listings.
    #[must_use]
    pub const fn active_orders_reminder_period(&self) -> Duration {
        self.active_orders_reminder_period
    }

    /// Returns the wait between two login-approval polls.
    #[must_use]
    pub const fn login_polling_period(&self) -> Duration {
        self.login_polling_period
    }

    /// Returns how long to wait for the login email to be approved.
    #[must_use]
    pub const fn login_email_validation_timeout(&self) -> Duration {
        self.login_email_validation_timeout
    }

    /// Returns how long a login stays valid.
    #[must_use]
    pub const fn login_validity_duration(&self) -> Duration {
        self.login_validity_duration
    }

    /// Returns how long an access token stays valid.
    #[must_use]
    pub const fn token_validity_duration(&self) -> Duration {
        self.token_validity_duration
    }

    /// Returns the timeout of a single HTTP request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the store search parameters.
    #[must_use]
    pub const fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Returns the application version used in device signatures.
    #[must_use]
    pub fn apk_version(&self) -> &str {
        &self.apk_version
    }

    /// Returns whether `Accept-Encoding: gzip` is sent.
    #[must_use]
    pub const fn use_gzip_encoding(&self) -> bool {
        self.use_gzip_encoding
    }

    /// Returns the directory holding session snapshots.
    #[must_use]
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Returns how many account rotations a single call may perform.
    #[must_use]
    pub const fn max_challenge_rotations(&self) -> u32 {
        self.max_challenge_rotations
    }

    /// Returns whether request and response headers are traced.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns a copy of this configuration with `verbose` overridden.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// Verify AntConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AntConfig>();
};

/// Builder for constructing [`AntConfig`] instances.
///
/// At least one account is required. All other fields have defaults.
///
/// # Defaults
///
/// - `language`: `en-US`
/// - `base_url`: [`DEFAULT_BASE_URL`]
/// - `average_requests_period`: 45s
/// - `too_many_requests_pause_period`: 1h30m
/// - `active_orders_reminder_period`: 10m
/// - `login_polling_period`: 15s
/// - `login_email_validation_timeout`: 30m
/// - `login_validity_duration`: 48h
/// - `token_validity_duration`: 8h
/// - `request_timeout`: 15s
/// - `use_gzip_encoding`: `true`
/// - `snapshot_dir`: [`DEFAULT_SNAPSHOT_DIR`]
/// - `max_challenge_rotations`: 10
#[derive(Debug, Default)]
pub struct AntConfigBuilder {
    accounts: Vec<Account>,
    language: Option<String>,
    base_url: Option<BaseUrl>,
    endpoints: Option<Endpoints>,
    average_requests_period: Option<Duration>,
    too_many_requests_pause_period: Option<Duration>,
    active_orders_reminder_period: Option<Duration>,
    login_polling_period: Option<Duration>,
    login_email_validation_timeout: Option<Duration>,
    login_validity_duration: Option<Duration>,
    token_validity_duration: Option<Duration>,
    request_timeout: Option<Duration>,
    search: Option<SearchConfig>,
    apk_version: Option<String>,
    use_gzip_encoding: Option<bool>,
    snapshot_dir: Option<PathBuf>,
    max_challenge_rotations: Option<u32>,
    verbose: bool,
}

impl AntConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an account to the pool.
    #[must_use]
    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Replaces the account pool.
    #[must_use]
    pub fn accounts(mut self, accounts: Vec<Account>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Sets the `Accept-Language` value.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the base URL of the remote API.
    #[must_use]
    pub fn base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Overrides the endpoint paths.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Sets the average period between two requests of one account.
    #[must_use]
    pub const fn average_requests_period(mut self, period: Duration) -> Self {
        self.average_requests_period = Some(period);
        self
    }

    /// Sets the cooldown applied when account rotation wraps around.
    #[must_use]
    pub const fn too_many_requests_pause_period(mut self, period: Duration) -> Self {
        self.too_many_requests_pause_period = Some(period);
        self
    }

    /// Sets the minimum period between two open-orders listings.
    #[must_use]
    pub const fn active_orders_reminder_period(mut self, period: Duration) -> Self {
        self.active_orders_reminder_period = Some(period);
        self
    }

    /// Sets the wait between two login-approval polls.
    #[must_use]
    pub const fn login_polling_period(mut self, period: Duration) -> Self {
        self.login_polling_period = Some(period);
        self
    }

    /// Sets how long to wait for the login email to be approved.
    #[must_use]
    pub const fn login_email_validation_timeout(mut self, timeout: Duration) -> Self {
        self.login_email_validation_timeout = Some(timeout);
        self
    }

    /// Sets how long a login stays valid.
    #[must_use]
    pub const fn login_validity_duration(mut self, duration: Duration) -> Self {
        self.login_validity_duration = Some(duration);
        self
    }

    /// Sets how long an access token stays valid.
    #[must_use]
    pub const fn token_validity_duration(mut self, duration: Duration) -> Self {
        self.token_validity_duration = Some(duration);
        self
    }

    /// Sets the timeout of a single HTTP request.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the store search parameters.
    #[must_use]
    pub fn search(mut self, search: SearchConfig) -> Self {
        self.search = Some(search);
        self
    }

    /// Sets the application version used in device signatures.
    #[must_use]
    pub fn apk_version(mut self, version: impl Into<String>) -> Self {
        self.apk_version = Some(version.into());
        self
    }

    /// Sets whether `Accept-Encoding: gzip` is sent.
    #[must_use]
    pub const fn use_gzip_encoding(mut self, enabled: bool) -> Self {
        self.use_gzip_encoding = Some(enabled);
        self
    }

    /// Sets the directory holding session snapshots.
    #[must_use]
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Sets how many account rotations a single call may perform.
    #[must_use]
    pub const fn max_challenge_rotations(mut self, rotations: u32) -> Self {
        self.max_challenge_rotations = Some(rotations);
        self
    }

    /// Enables request and response header tracing.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds the [`AntConfig`], validating the account pool and durations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoAccounts`] if no account was added and
    /// [`ConfigError::ZeroDuration`] if a validity window or the request
    /// timeout is zero.
    pub fn build(self) -> Result<AntConfig, ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        let base_url = match self.base_url {
            Some(url) => url,
            None => BaseUrl::new(DEFAULT_BASE_URL)?,
        };

        let config = AntConfig {
            accounts: self.accounts,
            language: self.language.unwrap_or_else(|| "en-US".to_string()),
            base_url,
            endpoints: self.endpoints.unwrap_or_default(),
            average_requests_period: self
                .average_requests_period
                .unwrap_or(Duration::from_secs(45)),
            too_many_requests_pause_period: self
                .too_many_requests_pause_period
                .unwrap_or(Duration::from_secs(90 * 60)),
            active_orders_reminder_period: self
                .active_orders_reminder_period
                .unwrap_or(Duration::from_secs(10 * 60)),
            login_polling_period: self
                .login_polling_period
                .unwrap_or(Duration::from_secs(15)),
            login_email_validation_timeout: self
                .login_email_validation_timeout
                .unwrap_or(Duration::from_secs(30 * 60)),
            login_validity_duration: self
                .login_validity_duration
                .unwrap_or(Duration::from_secs(48 * 3600)),
            token_validity_duration: self
                .token_validity_duration
                .unwrap_or(Duration::from_secs(8 * 3600)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(15)),
            search: self.search.unwrap_or_default(),
            apk_version: self
                .apk_version
                .unwrap_or_else(|| DEFAULT_APK_VERSION.to_string()),
            use_gzip_encoding: self.use_gzip_encoding.unwrap_or(true),
            snapshot_dir: self
                .snapshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            max_challenge_rotations: self.max_challenge_rotations.unwrap_or(10),
            verbose: self.verbose,
        };

        for (field, value) in [
            ("logInValidityDuration", config.login_validity_duration),
            ("tokenValidityDuration", config.token_validity_duration),
            ("requestTimeout", config.request_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> Account {
        Account::new(AccountEmail::new(email).unwrap())
    }

    #[test]
    fn test_builder_requires_an_account() {
        let result = AntConfigBuilder::new().build();
        assert!(matches!(result, Err(ConfigError::NoAccounts)));
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = AntConfig::builder()
            .account(account("me@example.com"))
            .build()
            .unwrap();

        assert_eq!(config.language(), "en-US");
        assert_eq!(config.base_url().as_ref(), DEFAULT_BASE_URL);
        assert_eq!(config.average_requests_period(), Duration::from_secs(45));
        assert_eq!(config.token_validity_duration(), Duration::from_secs(8 * 3600));
        assert_eq!(config.login_validity_duration(), Duration::from_secs(48 * 3600));
        assert_eq!(config.snapshot_dir(), Path::new("secrets"));
        assert_eq!(config.max_challenge_rotations(), 10);
        assert!(config.use_gzip_encoding());
        assert!(!config.verbose());
        assert_eq!(config.endpoints(), &Endpoints::default());
    }

    #[test]
    fn test_builder_rejects_zero_validity() {
        let result = AntConfig::builder()
            .account(account("me@example.com"))
            .token_validity_duration(Duration::ZERO)
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::ZeroDuration {
                field: "tokenValidityDuration"
            })
        ));
    }

    #[test]
    fn test_builder_keeps_account_order() {
        let config = AntConfig::builder()
            .account(account("first@example.com"))
            .account(account("second@example.com"))
            .build()
            .unwrap();

        let emails: Vec<&str> = config.accounts().iter().map(|a| a.email.as_ref()).collect();
        assert_eq!(emails, vec!["first@example.com", "second@example.com"]);
    }

    #[test]
    fn test_endpoint_template_substitution() {
        let endpoints = Endpoints::default();
        assert_eq!(
            Endpoints::with_id(&endpoints.pay_order, "abc"),
            "order/v7/abc/pay"
        );
        assert_eq!(
            Endpoints::with_id(&endpoints.create_order, "42"),
            "order/v7/create/42"
        );
    }

    #[test]
    fn test_config_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AntConfig>();
    }
}
