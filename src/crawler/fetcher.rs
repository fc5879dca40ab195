//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests that follow redirects
//! - Content-Type parsing into a MIME type and a charset
//! - Modification time from the Date or Last-Modified header
//! - Error classification (transport failure or non-success status)

use crate::config::Config;
use crate::url::SiteScope;
use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, CONTENT_TYPE, DATE, LAST_MODIFIED};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// A resource received with a success status
#[derive(Debug, Clone)]
pub struct RemoteResource {
    /// URL that was requested
    pub url: Url,

    /// URL the response came from, after redirects
    pub final_url: Url,

    /// Lowercased MIME type from the Content-Type header
    pub mime_type: Option<String>,

    /// Encoding named by the Content-Type charset parameter
    pub declared_encoding: Option<&'static Encoding>,

    /// Response body
    pub body: Vec<u8>,

    /// Server-side timestamp of the resource
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteResource {
    /// Returns the declared encoding, or UTF-8 when the server named none
    pub fn encoding(&self) -> &'static Encoding {
        self.declared_encoding.unwrap_or(UTF_8)
    }

    /// Returns true if a redirect moved the resource to another URL
    pub fn was_redirected(&self) -> bool {
        self.url != self.final_url
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the resource
    Fetched(RemoteResource),

    /// The server answered with a non-success status
    HttpError {
        /// The requested URL
        url: Url,
        /// The HTTP status code
        status_code: u16,
    },

    /// Transport failure (connection refused, timeout, broken body, ...)
    NetworkError {
        /// The requested URL
        url: Url,
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed while they stay inside `scope`. A redirect that
/// leaves the site is not followed, so the 3xx response itself comes back
/// and is treated like any other non-success status.
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `scope` - The site being mirrored
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::config::Config;
/// use sumi_mirror::crawler::build_http_client;
/// use sumi_mirror::url::SiteScope;
///
/// let scope = SiteScope::new("http://example.com/").unwrap();
/// let client = build_http_client(&Config::default(), &scope).unwrap();
/// ```
pub fn build_http_client(config: &Config, scope: &SiteScope) -> Result<Client, reqwest::Error> {
    let scope = scope.clone();
    let redirects = Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !scope.contains(attempt.url()) {
            tracing::debug!("Not following redirect off-site to {}", attempt.url());
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(Duration::from_millis(config.http.request_timeout_ms))
        .connect_timeout(Duration::from_millis(config.http.connect_timeout_ms))
        .redirect(redirects)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with a single GET request
///
/// # Outcomes
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | Fetched |
/// | Any other final status | HttpError |
/// | Redirect leaving the site | HttpError (the 3xx status) |
/// | Timeout, connection or TLS failure | NetworkError |
/// | Body interrupted | NetworkError |
/// | Too many redirects | NetworkError |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            return FetchResult::NetworkError {
                url: url.clone(),
                error,
            };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            url: url.clone(),
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().clone();
    let headers = response.headers();
    let (mime_type, declared_encoding) = parse_content_type(
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );
    let last_modified = resource_timestamp(headers);

    match response.bytes().await {
        Ok(body) => FetchResult::Fetched(RemoteResource {
            url: url.clone(),
            final_url,
            mime_type,
            declared_encoding,
            body: body.to_vec(),
            last_modified,
        }),
        Err(e) => FetchResult::NetworkError {
            url: url.clone(),
            error: format!("Failed to read body: {}", e),
        },
    }
}

/// Splits a Content-Type header value into a MIME type and a charset
///
/// The MIME type is trimmed and lowercased. The charset parameter may be
/// quoted; unknown labels are ignored.
///
/// # Examples
///
/// ```
/// use sumi_mirror::crawler::parse_content_type;
///
/// let (mime, charset) = parse_content_type(Some("Text/HTML; charset=\"ISO-8859-1\""));
/// assert_eq!(mime.as_deref(), Some("text/html"));
/// assert_eq!(charset.map(|e| e.name()), Some("windows-1252"));
/// ```
pub fn parse_content_type(value: Option<&str>) -> (Option<String>, Option<&'static Encoding>) {
    let Some(value) = value else {
        return (None, None);
    };

    let mut parts = value.split(';');
    let mime_type = parts
        .next()
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty());

    let encoding = parts
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| {
            let label = label.trim().trim_matches(|c: char| c == '"' || c == '\'');
            Encoding::for_label(label.as_bytes())
        });

    (mime_type, encoding)
}

/// Parses an HTTP date (RFC 1123 form, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The resource timestamp: the Date header, else Last-Modified
fn resource_timestamp(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    [DATE, LAST_MODIFIED].iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date)
    })
}
