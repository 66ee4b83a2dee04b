//! HTTP transport for the remote API.
//!
//! This module provides the [`HttpTransport`] type which sends one POST
//! request with the standard headers and decodes the response body. It
//! performs no retries and never touches the session; recovery and cookie
//! bookkeeping belong to the pipeline in [`ApiClient`](crate::ApiClient).

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::StatusCode;
use reqwest::header::{
    HeaderMap, HeaderName, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE,
    COOKIE, SET_COOKIE, USER_AGENT,
};

use crate::auth::Session;
use crate::clients::codec;
use crate::clients::errors::TransportError;
use crate::clients::http_response::QueryResult;
use crate::config::{Account, AntConfig, BaseUrl};

/// Dalvik VM version advertised in device signatures.
pub const DALVIK_VERSION: &str = "2.1.0";

/// Returns the pool of built-in Android device signatures.
#[must_use]
pub fn device_signatures(apk_version: &str) -> [String; 3] {
    [
        format!("TGTG/{apk_version} Dalvik/{DALVIK_VERSION} (Linux; Android 12; SM-G973F Build/SP1A.210812.016; wv)"),
        format!("TGTG/{apk_version} Dalvik/{DALVIK_VERSION} (Linux; Android 12; SM-G975U1 Build/SP1A.210812.016; wv)"),
        format!("TGTG/{apk_version} Dalvik/{DALVIK_VERSION} (Linux; Android 13; SAMSUNG SM-G991U1)"),
    ]
}

/// Returns the device signature to use for `account`.
///
/// The account's fixed signature wins; otherwise one is drawn at random from
/// [`device_signatures`].
#[must_use]
pub fn device_signature_for(account: &Account, apk_version: &str) -> String {
    if let Some(user_agent) = &account.user_agent {
        return user_agent.clone();
    }
    let pool = device_signatures(apk_version);
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| pool[0].clone())
}

/// Sends requests on behalf of one account and returns the decoded result.
///
/// Implemented by the pipeline on top of [`HttpTransport`] and by scripted
/// fakes in tests.
pub(crate) trait Exchange {
    /// Sends `payload` to `path`, pacing first when `allow_sleep` is set.
    ///
    /// The result is returned whatever its status code.
    async fn exchange(
        &mut self,
        session: &mut Session,
        path: &str,
        payload: &serde_json::Value,
        allow_sleep: bool,
    ) -> Result<QueryResult, TransportError>;

    /// Waits for `duration` unless shutdown is requested.
    async fn pause(&mut self, duration: Duration) -> Result<(), TransportError>;
}

/// HTTP transport for the remote API.
///
/// # Thread Safety
///
/// `HttpTransport` is `Send + Sync`; the inner connection pool is shared.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: BaseUrl,
    language: String,
    use_gzip_encoding: bool,
    verbose: bool,
}

// Verify HttpTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpTransport>();
};

impl HttpTransport {
    /// Creates a transport from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the HTTP client cannot be
    /// initialized.
    pub fn new(config: &AntConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().clone(),
            language: config.language().to_string(),
            use_gzip_encoding: config.use_gzip_encoding(),
            verbose: config.verbose(),
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the headers sent with every request of `session`.
    ///
    /// `Cookie` appears once per stored cookie.
    #[must_use]
    pub fn headers_for(&self, session: &Session) -> Vec<(HeaderName, String)> {
        let mut headers = vec![(ACCEPT, "application/json".to_string())];
        if self.use_gzip_encoding {
            headers.push((ACCEPT_ENCODING, "gzip".to_string()));
        }
        headers.push((ACCEPT_LANGUAGE, self.language.clone()));
        headers.push((
            CONTENT_TYPE,
            "application/json; charset=utf-8".to_string(),
        ));
        headers.push((USER_AGENT, session.user_agent.clone()));
        for cookie in &session.cookies {
            headers.push((COOKIE, cookie.clone()));
        }
        if !session.access_token.is_empty() {
            headers.push((AUTHORIZATION, format!("Bearer {}", session.access_token)));
        }
        headers
    }

    /// Sends `payload` to `path` and decodes the response.
    ///
    /// The session is not modified; `Set-Cookie` values are returned in
    /// [`QueryResult::set_cookies`] for the caller to keep or drop.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the payload cannot be serialized, the
    /// request fails at the network level, or the body cannot be decoded.
    /// The body of a 401 is never needed, so a 401 whose body cannot be
    /// decoded is returned with the raw body instead.
    pub async fn send(
        &self,
        session: &Session,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<QueryResult, TransportError> {
        let url = self.base_url.join(path);
        let body = serde_json::to_vec(payload)?;
        let headers = self.headers_for(session);

        tracing::debug!("POST {}", url);
        if self.verbose {
            for (name, value) in &headers {
                let value = if *name == AUTHORIZATION { "Bearer *****" } else { value.as_str() };
                tracing::debug!("  request header {}: {}", name, value);
            }
        }

        let mut request = self.client.post(&url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.body(body).send().await?;

        let code = response.status().as_u16();
        let response_headers = response.headers().clone();
        if self.verbose {
            dump_headers(&response_headers);
        }

        let raw = response.bytes().await?;
        let decoded = match codec::decode_body(&response_headers, &raw) {
            Ok(decoded) => decoded,
            Err(e) if code == StatusCode::UNAUTHORIZED.as_u16() => {
                tracing::debug!("ignoring undecodable 401 body from {}: {}", path, e);
                raw.to_vec()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("{} answered {}", path, code);
        Ok(QueryResult::new(code, decoded, path).with_set_cookies(set_cookies(&response_headers)))
    }
}

/// Collects the `Set-Cookie` values of a response, in header order.
fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn dump_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        tracing::debug!(
            "  response header {}: {}",
            name,
            String::from_utf8_lossy(value.as_bytes())
        );
    }
}
