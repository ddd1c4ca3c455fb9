//! Minimal GitHub REST API client.
//!
//! This crate provides a focused client for the GitHub v3 API with:
//! - A global minimum spacing between requests, derived from an hourly budget
//! - Indefinite exponential backoff while the API reports a rate limit
//! - Transparent pagination of list results via the `Link` header
//!
//! Upstream failures are returned as data, not as [`Error`]: an object
//! carrying `message` and `documentation_url`, recognised by [`is_error`].

pub mod testing;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK, USER_AGENT};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://api.github.com/";
const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const DEFAULT_USER_AGENT: &str = "ghgraph";

/// Logged-in users get 5000 requests per hour.
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 5000;

/// First wait after a rate-limit response; doubles on every retry.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(10);

const RATE_LIMIT_PREFIX: &str = "API rate limit";
const NO_CONTENT: &str = "No Content";

/// Errors that can occur when using the GitHub client.
///
/// Non-success HTTP statuses and unreadable bodies are not errors here; they
/// come back as upstream-shaped error objects so callers can treat them as
/// "not found".
#[derive(Debug, Error)]
pub enum Error {
    #[error("Credentials not configured")]
    NoCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Login failure: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Username and personal access token, presented as basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Read credentials from `GITHUB_USERNAME` and `GITHUB_TOKEN`.
    pub fn from_env() -> Result<Self, Error> {
        let username = std::env::var("GITHUB_USERNAME").map_err(|_| Error::NoCredentials)?;
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| Error::NoCredentials)?;
        Ok(Self::new(username, token))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, always ending in `/`.
    pub base_url: String,

    /// Hourly request budget; requests are spaced `3600 / budget` seconds apart.
    pub requests_per_hour: u32,

    /// Wait before the first retry of a rate-limited request.
    pub initial_backoff: Duration,

    /// Value of the `User-Agent` header (required by the API).
    pub user_agent: String,

    /// Optional credentials, validated once when the client connects.
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE.to_string(),
            requests_per_hour: DEFAULT_REQUESTS_PER_HOUR,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credentials: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_requests_per_hour(mut self, requests_per_hour: u32) -> Self {
        self.requests_per_hour = requests_per_hour;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Minimum spacing between two outbound requests.
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs_f64(3600.0 / f64::from(self.requests_per_hour.max(1)))
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A single outbound GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// What came back from one GET, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `Link` header, if present.
    pub link: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            link: None,
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// The raw request/response primitive underneath [`GithubClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<RawResponse, Error>;
}

/// [`Transport`] over a real HTTP connection.
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| Error::Config(format!("Invalid user agent: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &HttpRequest) -> Result<RawResponse, Error> {
        let mut builder = self.client.get(&request.url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.token));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let link = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(RawResponse { status, link, body })
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Enforces a minimum spacing between consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the interval since the previous request has elapsed, then
    /// mark a new request as sent.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let ready = last + self.interval;
            if Instant::now() < ready {
                tokio::time::sleep_until(ready).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

// ============================================================================
// Client
// ============================================================================

/// One page of a response: its interpreted body and the next-page URL.
struct Page {
    data: Value,
    next: Option<String>,
}

/// GitHub API client.
///
/// Owns the rate limiter; every request made through one client shares its
/// clock, regardless of which resource it is for.
pub struct GithubClient {
    transport: Box<dyn Transport>,
    base_url: String,
    limiter: RateLimiter,
    initial_backoff: Duration,
    login: Option<String>,
}

impl GithubClient {
    /// Connect over HTTP. Fails if configured credentials are rejected.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(Box::new(transport), config).await
    }

    /// Connect over an arbitrary transport.
    pub async fn with_transport(
        transport: Box<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        let mut client = Self {
            transport,
            limiter: RateLimiter::new(config.request_interval()),
            base_url: config.base_url,
            initial_backoff: config.initial_backoff,
            login: None,
        };
        if config.credentials.is_some() {
            client.authenticate().await?;
        }
        Ok(client)
    }

    /// Login of the authenticated user, if credentials were configured.
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the JSON value at `path`.
    ///
    /// `path` is relative to the base URL (like `users/name`) or absolute.
    /// If the result is a list, all further pages are fetched and appended.
    /// If any later page fails, the collected items are dropped and that
    /// page's error object is returned instead. Use [`is_error`] on the result.
    pub async fn get(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Value, Error> {
        let url = self.resolve_url(path);
        let first = self.get_with_backoff(&url, params).await?;

        let mut items = match first.data {
            Value::Array(items) => items,
            other => return Ok(other),
        };

        let mut next = first.next;
        while let Some(next_url) = next {
            let page = self.get_with_backoff(&next_url, &[]).await?;
            match page.data {
                Value::Array(more) => {
                    items.extend(more);
                    next = page.next;
                }
                other => {
                    warn!(
                        url = %next_url,
                        discarded = items.len(),
                        "list page failed, discarding collected items"
                    );
                    return Ok(other);
                }
            }
        }

        Ok(Value::Array(items))
    }

    async fn authenticate(&mut self) -> Result<(), Error> {
        let url = self.resolve_url("user");
        let response = self.send(&url, &[]).await?;
        if response.status != 200 {
            return Err(Error::Auth(format!(
                "status {}: {}",
                response.status, response.body
            )));
        }

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| Error::Auth(format!("unreadable user object: {e}")))?;
        let login = body
            .get("login")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth(response.body.clone()))?;

        info!(login, "logged in");
        self.login = Some(login.to_string());
        Ok(())
    }

    async fn get_with_backoff(
        &mut self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Page, Error> {
        let mut wait = self.initial_backoff;
        loop {
            let page = self.get_page(url, params).await?;
            match error_message(&page.data) {
                Some(message) if message.starts_with(RATE_LIMIT_PREFIX) => {
                    warn!(
                        url,
                        wait_secs = wait.as_secs_f64(),
                        "api rate limit reached, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    wait *= 2;
                }
                _ => return Ok(page),
            }
        }
    }

    async fn get_page(&mut self, url: &str, params: &[(&str, &str)]) -> Result<Page, Error> {
        let response = self.send(url, params).await?;
        let data = match response.status {
            204 => error_object(NO_CONTENT),
            status if (200..300).contains(&status) => serde_json::from_str(&response.body)
                .unwrap_or_else(|e| {
                    warn!(url, status, error = %e, "unreadable response body");
                    error_object(&format!("GET failure: {status} unreadable body: {e}"))
                }),
            status => error_object(&failure_message(status, &response.body)),
        };
        let next = response.link.as_deref().and_then(next_link);
        Ok(Page { data, next })
    }

    async fn send(&mut self, url: &str, params: &[(&str, &str)]) -> Result<RawResponse, Error> {
        self.limiter.wait().await;
        debug!(url, ?params, "session-get");
        let request = HttpRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.transport.get(&request).await
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

// ============================================================================
// Error objects
// ============================================================================

/// Whether `value` is an upstream error object.
pub fn is_error(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.contains_key("message") && o.contains_key("documentation_url"))
}

/// The message of an upstream error object, or `None` for any other value.
pub fn error_message(value: &Value) -> Option<&str> {
    if !is_error(value) {
        return None;
    }
    Some(value["message"].as_str().unwrap_or_default())
}

/// Build an upstream-shaped error object.
pub fn error_object(message: &str) -> Value {
    json!({
        "documentation_url": "",
        "message": message,
    })
}

/// Keep the upstream message when the body carries one, so rate-limit
/// responses stay recognisable.
fn failure_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("GET failure: {status} {body}"))
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut segments = part.split(';');
        let Some(target) = segments.next().map(str::trim) else {
            continue;
        };
        if segments.any(|s| s.trim() == r#"rel="next""#) {
            return target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string);
        }
    }
    None
}
