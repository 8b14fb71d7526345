//! HTTP request building and execution
//!
//! Every call goes through [`HttpClient::execute`], which applies the
//! per-kind timeout, logs rate-limit headers, reads the body and hands the
//! result to [`classify`]. Transport faults come back as
//! [`ApiOutcome::TransportError`]; nothing here returns `Err` to the caller.

mod multipart;

pub use multipart::{FilePart, FileSource, MultipartBody, MultipartForm};

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, RequestBuilder, Url};
use tracing::{debug, warn};

use crate::humanize::HumanDuration;
use crate::observability::Metrics;
use crate::outcome::{ApiError, ApiOutcome, classify};

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const RATE_LIMIT_LOW_WATER: u64 = 10;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Total time allowed for small JSON calls
    pub read_timeout: Duration,
    /// Total time allowed for file uploads
    pub upload_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
            upload_timeout: Duration::from_secs(30),
            user_agent: concat!("verdict/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Which timeout applies to a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Json,
    Upload,
}

/// Base URL + path + query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Resolve into a URL, percent-encoding query values as UTF-8
    pub fn to_url(&self) -> Result<Url, ApiError> {
        let base = self.base.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let raw = if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                raw
            )));
        }

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }
}

/// Rate-limit headers reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        let rate_limit = Self {
            limit: read("x-ratelimit-limit"),
            remaining: read("x-ratelimit-remaining"),
            reset: read("x-ratelimit-reset"),
        };

        (rate_limit.limit.is_some() || rate_limit.remaining.is_some() || rate_limit.reset.is_some())
            .then_some(rate_limit)
    }

    pub fn is_low(&self) -> bool {
        self.remaining.is_some_and(|r| r < RATE_LIMIT_LOW_WATER)
    }
}

/// Shared HTTP transport for all API clients
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
    metrics: Arc<Metrics>,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// GET with `Accept: application/json`
    pub async fn get(&self, endpoint: &Endpoint, headers: &[(String, String)]) -> ApiOutcome<String> {
        let url = match endpoint.to_url() {
            Ok(url) => url,
            Err(e) => return ApiOutcome::TransportError { message: e.to_string() },
        };

        let request = with_headers(self.client.get(url.clone()), headers);
        self.execute(request, &url, CallKind::Json).await
    }

    /// POST a JSON body verbatim
    pub async fn post_json(
        &self,
        endpoint: &Endpoint,
        body: String,
        headers: &[(String, String)],
    ) -> ApiOutcome<String> {
        let url = match endpoint.to_url() {
            Ok(url) => url,
            Err(e) => return ApiOutcome::TransportError { message: e.to_string() },
        };

        let request = with_headers(self.client.post(url.clone()), headers)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body);
        self.execute(request, &url, CallKind::Json).await
    }

    /// POST a multipart form, streaming any file part
    pub async fn post_multipart(&self, endpoint: &Endpoint, form: MultipartForm) -> ApiOutcome<String> {
        let url = match endpoint.to_url() {
            Ok(url) => url,
            Err(e) => return ApiOutcome::TransportError { message: e.to_string() },
        };

        let body = match form.into_body().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.request_sent();
                self.metrics.request_failed();
                return ApiOutcome::TransportError {
                    message: format!("failed to open upload file: {}", e),
                };
            }
        };

        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, body.content_type)
            .header(CONTENT_LENGTH, body.content_length)
            .body(body.body);
        self.execute(request, &url, CallKind::Upload).await
    }

    async fn execute(&self, request: RequestBuilder, url: &Url, kind: CallKind) -> ApiOutcome<String> {
        let timeout = match kind {
            CallKind::Json => self.config.read_timeout,
            CallKind::Upload => self.config.upload_timeout,
        };

        let started = Instant::now();
        self.metrics.request_sent();
        debug!(%url, ?kind, "Sending request");

        let response = match request
            .header(ACCEPT, mime::APPLICATION_JSON.as_ref())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.metrics.request_failed();
                let message = transport_message(&e, timeout);
                warn!(%url, error = %message, "Request failed");
                return ApiOutcome::TransportError { message };
            }
        };

        let status = response.status().as_u16();
        if let Some(rate_limit) = RateLimit::from_headers(response.headers()) {
            self.log_rate_limit(url, &rate_limit);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.request_failed();
                let message = format!("failed to read response body: {}", transport_message(&e, timeout));
                warn!(%url, status, error = %message, "Request failed");
                return ApiOutcome::TransportError { message };
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = classify(status, body);
        if outcome.is_success() {
            debug!(%url, status, elapsed_ms, "Request completed");
        } else {
            self.metrics.request_failed();
            warn!(%url, status, elapsed_ms, "Request rejected");
        }

        outcome
    }

    fn log_rate_limit(&self, url: &Url, rate_limit: &RateLimit) {
        debug!(
            %url,
            limit = ?rate_limit.limit,
            remaining = ?rate_limit.remaining,
            reset = ?rate_limit.reset,
            "Rate limit status"
        );

        if rate_limit.is_low() {
            self.metrics.rate_limit_warning();
            warn!(
                %url,
                remaining = ?rate_limit.remaining,
                reset = ?rate_limit.reset,
                "Rate limit nearly exhausted"
            );
        }
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name, value);
    }
    request
}

fn transport_message(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("request timed out after {}", HumanDuration(timeout))
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else if e.is_builder() {
        format!("malformed request: {}", e)
    } else {
        e.to_string()
    }
}
