//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated account email address.
///
/// The email is the account identifier on the remote service and also keys
/// the persisted session snapshot, so it is trimmed and lowercased.
///
/// # Example
///
/// ```rust
/// use tgtg_ant::AccountEmail;
///
/// let email = AccountEmail::new(" Me@Example.com ").unwrap();
/// assert_eq!(email.as_ref(), "me@example.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountEmail(String);

impl AccountEmail {
    /// Creates a new validated account email.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEmail`] if the value is empty, has no
    /// local part or domain, or contains characters that cannot appear in a
    /// snapshot file name.
    pub fn new(email: impl Into<String>) -> Result<Self, ConfigError> {
        let email = email.into().trim().to_lowercase();

        let valid = email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }) && !email
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '"'));

        if !valid {
            return Err(ConfigError::InvalidEmail { email });
        }
        Ok(Self(email))
    }
}

impl AsRef<str> for AccountEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AccountEmail {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountEmail {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// One account of the pool.
///
/// An account may pin its device signature (`User-Agent`); otherwise one is
/// drawn from the built-in pool when the account is first used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The account email.
    pub email: AccountEmail,
    /// A fixed device signature to use for this account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Account {
    /// Creates an account without a fixed device signature.
    #[must_use]
    pub const fn new(email: AccountEmail) -> Self {
        Self {
            email,
            user_agent: None,
        }
    }

    /// Pins the device signature used for this account.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        self.user_agent = (!user_agent.is_empty()).then_some(user_agent);
        self
    }
}

/// A validated base URL for the remote API.
///
/// The URL always ends with a `/` so that endpoint paths can be appended.
///
/// # Example
///
/// ```rust
/// use tgtg_ant::BaseUrl;
///
/// let url = BaseUrl::new("https://apptoogoodtogo.com/api").unwrap();
/// assert_eq!(url.join("item/v7/"), "https://apptoogoodtogo.com/api/item/v7/");
/// assert_eq!(url.host_name(), "apptoogoodtogo.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrl {
    url: String,
    host_start: usize,
    host_end: usize,
}

impl BaseUrl {
    /// Creates a new validated base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL has no http(s)
    /// scheme or no host.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let mut url = url.into().trim().to_string();

        let scheme_end = url
            .find("://")
            .ok_or_else(|| ConfigError::InvalidBaseUrl { url: url.clone() })?;

        let scheme = url[..scheme_end].to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidBaseUrl { url });
        }

        let host_start = scheme_end + 3;
        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/', '?', '#'])
            .map_or(url.len(), |i| host_start + i);

        if host_start >= host_end {
            return Err(ConfigError::InvalidBaseUrl { url });
        }

        if !url.ends_with('/') {
            url.push('/');
        }

        Ok(Self {
            url,
            host_start,
            host_end,
        })
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Appends an endpoint path to the base URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.url, path.trim_start_matches('/'))
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_email_normalizes() {
        let email = AccountEmail::new("  Someone@Example.COM").unwrap();
        assert_eq!(email.as_ref(), "someone@example.com");
        assert_eq!(email.to_string(), "someone@example.com");
    }

    #[test]
    fn test_account_email_rejects_invalid() {
        assert!(AccountEmail::new("").is_err());
        assert!(AccountEmail::new("no-at-sign").is_err());
        assert!(AccountEmail::new("@example.com").is_err());
        assert!(AccountEmail::new("me@").is_err());
        assert!(AccountEmail::new("me@a@b").is_err());
        assert!(AccountEmail::new("me/../x@example.com").is_err());
        assert!(AccountEmail::new("my name@example.com").is_err());
    }

    #[test]
    fn test_account_deserializes_with_optional_user_agent() {
        let account: Account = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert_eq!(account.email.as_ref(), "a@b.c");
        assert!(account.user_agent.is_none());

        let account: Account =
            serde_json::from_str(r#"{"email":"a@b.c","userAgent":"TGTG/1 Dalvik"}"#).unwrap();
        assert_eq!(account.user_agent.as_deref(), Some("TGTG/1 Dalvik"));
    }

    #[test]
    fn test_account_deserialization_rejects_bad_email() {
        let result: Result<Account, _> = serde_json::from_str(r#"{"email":"nope"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_user_agent_is_ignored() {
        let account = Account::new(AccountEmail::new("a@b.c").unwrap()).with_user_agent("");
        assert!(account.user_agent.is_none());
    }

    #[test]
    fn test_base_url_validates_format() {
        let url = BaseUrl::new("https://apptoogoodtogo.com/api/").unwrap();
        assert_eq!(url.host_name(), "apptoogoodtogo.com");
        assert_eq!(url.as_ref(), "https://apptoogoodtogo.com/api/");

        let url = BaseUrl::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.host_name(), "127.0.0.1");
        assert_eq!(url.join("/auth/v4/authByEmail"), "http://127.0.0.1:8080/auth/v4/authByEmail");
    }

    #[test]
    fn test_base_url_rejects_invalid() {
        assert!(BaseUrl::new("apptoogoodtogo.com").is_err());
        assert!(BaseUrl::new("https://").is_err());
        assert!(BaseUrl::new("ftp://example.com").is_err());
    }
}
