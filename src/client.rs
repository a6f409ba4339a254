//! HTTP client for habr.com with rate-limit backoff.
//!
//! Every request made by the crawler and the downloader goes through
//! [`HabrClient::request`]. The client is cheap to clone and all clones share
//! one connection pool, so it can be handed to any number of concurrent tasks.
//!
//! # Retry Strategy
//!
//! Only `429 Too Many Requests` is retried. Any other status, and any
//! transport error, is handed back to the caller on the first attempt.
//!
//! - Maximum 20 attempts
//! - Incrementing backoff: 1s, 3s, 5s, ... (`start + increment * (attempt - 1)`)
//! - When the last attempt is still rate limited, [`Error::RateLimited`] is returned

use crate::error::{Error, Result};
use crate::models::PostId;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const SITE_URL: &str = "https://habr.com";
pub const API_URL: &str = "https://habr.com/kek/v2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff schedule for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first rate-limited attempt.
    pub start: Duration,
    /// Added to the delay after each further rate-limited attempt.
    pub increment: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            start: Duration::from_secs(1),
            increment: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based attempt was rate limited.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.start + self.increment.saturating_mul(attempt.saturating_sub(1))
    }
}

/// Static settings of a [`HabrClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base for site-relative paths and post pages.
    pub site_url: Url,
    /// Base of the JSON API.
    pub api_url: Url,
    /// Timeout applied to every request unless overridden per request.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            site_url: Url::parse(SITE_URL).expect("SITE_URL is a valid URL"),
            api_url: Url::parse(API_URL).expect("API_URL is a valid URL"),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Shared, clonable habr.com client.
#[derive(Clone)]
pub struct HabrClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for HabrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HabrClient")
            .field("site_url", &self.config.site_url.as_str())
            .field("api_url", &self.config.api_url.as_str())
            .field("timeout", &self.config.timeout)
            .field("retry", &self.config.retry)
            .finish()
    }
}

impl HabrClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve `path` against the site base when it starts with `/`,
    /// otherwise parse it as an absolute URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        if path.starts_with('/') {
            Ok(self.config.site_url.join(path)?)
        } else {
            Ok(Url::parse(path)?)
        }
    }

    /// Send a request, backing off while the server answers `429`.
    ///
    /// Any response that is not `429` is returned as is, whatever its status.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method to send
    /// * `path` - Site-relative path or absolute URL
    /// * `options` - Query pairs, JSON body and timeout override
    ///
    /// # Returns
    ///
    /// The first response whose status is not `429`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] when every one of `max_attempts` attempts
    /// was answered with `429`, [`Error::Url`] for an unresolvable path, and
    /// [`Error::Http`] on transport failure or timeout (not retried).
    #[instrument(level = "debug", skip_all, fields(%method, %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = self.resolve(path)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let retry = self.config.retry;
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if !options.query.is_empty() {
                builder = builder.query(&options.query);
            }
            if let Some(body) = &options.json {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                debug!(attempt, status = %response.status(), "request completed");
                return Ok(response);
            }

            let elapsed_ms_total = total_t0.elapsed().as_millis();
            if attempt >= retry.max_attempts {
                error!(
                    attempt,
                    max = retry.max_attempts,
                    elapsed_ms_total,
                    %url,
                    "request still rate limited; giving up"
                );
                return Err(Error::RateLimited {
                    method,
                    url: url.to_string(),
                    attempts: attempt,
                });
            }

            let delay = retry.delay_after(attempt);
            warn!(
                attempt,
                max = retry.max_attempts,
                elapsed_ms_total,
                ?delay,
                %url,
                "rate limited; backing off"
            );
            sleep(delay).await;
        }
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, path, options).await
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, path, options).await
    }

    /// URL of the article listing endpoint.
    pub fn articles_url(&self) -> String {
        format!("{}/articles/", self.config.api_url.as_str().trim_end_matches('/'))
    }

    /// Fetch the HTML of a post page. Any non-success status is an error.
    #[instrument(level = "debug", skip_all, fields(%id))]
    pub async fn fetch_post_html(&self, id: &PostId) -> Result<String> {
        let path = format!("/ru/post/{id}");
        let response = self.get(&path, RequestOptions::default()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                method: Method::GET,
                url: response.url().to_string(),
                status,
            });
        }
        Ok(response.text().await?)
    }
}
