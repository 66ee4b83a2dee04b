//! Decoded responses of the remote API.
//!
//! This module provides the [`QueryResult`] type returned by the pipeline and
//! the detection of verification challenges in response bodies.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::Session;
use crate::models::{self, ParseError};

/// URL prefix of the verification challenges served by the remote API.
pub const CHALLENGE_URL_PREFIX: &str = "https://geo.captcha-delivery.com";

/// A decoded response of the remote API.
///
/// The body has already been through the content-encoding chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResult {
    /// The HTTP status code.
    pub code: u16,
    /// The decoded response body.
    pub body: Vec<u8>,
    /// The endpoint path that was called.
    pub path: String,
    /// `Set-Cookie` values of the response, in header order.
    pub set_cookies: Vec<String>,
}

#[derive(Deserialize)]
struct ChallengeProbe {
    url: Option<String>,
}

impl QueryResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(code: u16, body: impl Into<Vec<u8>>, path: impl Into<String>) -> Self {
        Self {
            code,
            body: body.into(),
            path: path.into(),
            set_cookies: Vec::new(),
        }
    }

    /// Attaches the `Set-Cookie` values of the response.
    #[must_use]
    pub fn with_set_cookies(mut self, set_cookies: Vec<String>) -> Self {
        self.set_cookies = set_cookies;
        self
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }

    /// Returns `true` for a 401 response.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.code == 401
    }

    /// Returns `true` if the body is empty or only whitespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Returns the challenge URL if the body is a verification challenge.
    ///
    /// A challenge is a JSON object whose `url` field points at
    /// [`CHALLENGE_URL_PREFIX`]. The status code is not considered.
    #[must_use]
    pub fn challenge_url(&self) -> Option<String> {
        serde_json::from_slice::<ChallengeProbe>(&self.body)
            .ok()
            .and_then(|probe| probe.url)
            .filter(|url| url.starts_with(CHALLENGE_URL_PREFIX))
    }

    /// Replaces the session's cookies with the ones this response sets.
    ///
    /// Nothing is recorded from a 401 or a verification challenge, nor when
    /// the response sets no cookie.
    pub(crate) fn record_cookies(&self, session: &mut Session) {
        if self.set_cookies.is_empty() || self.is_unauthorized() || self.challenge_url().is_some() {
            return;
        }
        session.cookies.clone_from(&self.set_cookies);
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self, entity: &'static str) -> Result<T, ParseError> {
        models::from_json(entity, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(QueryResult::new(200, "", "p").is_ok());
        assert!(QueryResult::new(204, "", "p").is_ok());
        assert!(!QueryResult::new(401, "", "p").is_ok());
        assert!(QueryResult::new(401, "", "p").is_unauthorized());
        assert!(!QueryResult::new(403, "", "p").is_ok());
    }

    #[test]
    fn test_challenge_detected_regardless_of_status() {
        let body = r#"{"url":"https://geo.captcha-delivery.com/captcha/?initialCid=abc"}"#;
        for code in [200, 403] {
            let result = QueryResult::new(code, body, "item/v7/");
            assert_eq!(
                result.challenge_url().as_deref(),
                Some("https://geo.captcha-delivery.com/captcha/?initialCid=abc")
            );
        }
    }

    #[test]
    fn test_other_urls_are_not_challenges() {
        let result = QueryResult::new(200, r#"{"url":"https://example.com"}"#, "p");
        assert!(result.challenge_url().is_none());

        let result = QueryResult::new(200, r#"{"items":[]}"#, "p");
        assert!(result.challenge_url().is_none());

        let result = QueryResult::new(200, "[1,2]", "p");
        assert!(result.challenge_url().is_none());

        let result = QueryResult::new(200, "", "p");
        assert!(result.challenge_url().is_none());
    }

    #[test]
    fn test_json_body() {
        let result = QueryResult::new(200, r#"{"payment_id":"p"}"#, "payment/v3/p");
        let value: serde_json::Value = result.json("payment status").unwrap();
        assert_eq!(value["payment_id"], "p");

        let result = QueryResult::new(200, "<html>", "payment/v3/p");
        assert!(result.json::<serde_json::Value>("payment status").is_err());
    }

    #[test]
    fn test_cookies_recorded_from_regular_responses() {
        let mut session = Session::new("ua");
        session.cookies = vec!["old=1".to_string()];

        QueryResult::new(200, "{}", "p").record_cookies(&mut session);
        assert_eq!(session.cookies, vec!["old=1".to_string()]);

        QueryResult::new(500, "", "p")
            .with_set_cookies(vec!["a=1".to_string(), "b=2".to_string()])
            .record_cookies(&mut session);
        assert_eq!(session.cookies, vec!["a=1".to_string(), "b=2".to_string()]);
    }

    #[test]
    fn test_cookies_not_recorded_from_challenges_or_401() {
        let mut session = Session::new("ua");
        session.cookies = vec!["old=1".to_string()];

        let body = r#"{"url":"https://geo.captcha-delivery.com/captcha/?initialCid=abc"}"#;
        QueryResult::new(403, body, "p")
            .with_set_cookies(vec!["challenge=1".to_string()])
            .record_cookies(&mut session);
        QueryResult::new(401, "", "p")
            .with_set_cookies(vec!["rejected=1".to_string()])
            .record_cookies(&mut session);

        assert_eq!(session.cookies, vec!["old=1".to_string()]);
    }

    #[test]
    fn test_whitespace_body_is_empty() {
        assert!(QueryResult::new(200, " \n", "p").is_empty());
        assert!(!QueryResult::new(200, "{}", "p").is_empty());
    }
}
