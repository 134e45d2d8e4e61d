//! OpenPhone HTTP client
//!
//! Every API call goes through [`OpenPhoneHttpClient::request`], which:
//! - takes a token from the shared [`RateLimiter`]
//! - holds a slot of the bounded concurrency gate for the duration of one attempt
//! - classifies the response and retries 429/5xx with exponential backoff
//!
//! The token and the gate slot are re-acquired for every retry and released
//! before the backoff sleep, so retries never hold capacity while waiting.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::downloader::config::{
    RetryPolicy, HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::downloader::rate_limit::RateLimiter;
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics::{record_retry, RequestTimer};

/// Result of a single attempt that did not end the request
enum AttemptOutcome {
    Success(Value),
    Retry {
        error_type: RetryErrorType,
        retry_after: Option<Duration>,
    },
}

/// Authenticated client for the OpenPhone public API
#[derive(Debug, Clone)]
pub struct OpenPhoneHttpClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
    gate: Arc<Semaphore>,
    retry_policy: RetryPolicy,
}

impl OpenPhoneHttpClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Raw key sent as the `Authorization` header
    /// * `base_url` - API root (e.g., "<https://api.openphone.com/v1>")
    /// * `rate_limiter` - Shared limiter (Arc so every issuer draws from one bucket)
    /// * `max_concurrency` - Maximum number of attempts in flight
    ///
    /// # Errors
    /// Returns [`FetcherError::Authentication`] if the key is not a valid header
    /// value, or a transport error if the underlying client cannot be built.
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        rate_limiter: Arc<RateLimiter>,
        max_concurrency: usize,
    ) -> FetcherResult<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(api_key).map_err(|e| FetcherError::Authentication {
            status: 0,
            message: format!("API key is not a valid header value: {e}"),
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetcherError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
            gate: Arc::new(Semaphore::new(max_concurrency.max(1))),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// API root all paths are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a path with query parameters
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> FetcherResult<Value> {
        self.request(Method::GET, path, query, None).await
    }

    /// POST a JSON body to a path
    pub async fn post(&self, path: &str, body: &Value) -> FetcherResult<Value> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    /// Execute one logical API call with retry
    ///
    /// Query parameters are sent in order, so a key may repeat
    /// (`phoneNumberId=a&phoneNumberId=b`).
    ///
    /// A 2xx response with an empty body or a non-JSON content type yields an
    /// empty JSON object.
    ///
    /// # Errors
    /// - [`FetcherError::Authentication`] on 401/403, never retried
    /// - [`FetcherError::RateLimit`] when 429 persists past the retry cap
    /// - [`FetcherError::Api`] for exhausted 5xx retries, other statuses >= 400,
    ///   and transport failures (status 0)
    /// - [`FetcherError::Parse`] when a JSON body cannot be decoded
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> FetcherResult<Value> {
        let url = self.url(path);
        let max_retries = self.retry_policy.max_retries;
        let mut retries = 0u32;

        loop {
            match self.attempt(&method, &url, path, query, body, retries).await? {
                AttemptOutcome::Success(value) => {
                    if retries > 0 {
                        let ctx = RetryContext::new(
                            retries,
                            max_retries,
                            RetryErrorType::NetworkGeneric,
                            Duration::ZERO,
                            path,
                        );
                        info!("{}", ctx.format_success());
                    }
                    return Ok(value);
                }
                AttemptOutcome::Retry {
                    error_type,
                    retry_after,
                } => {
                    retries += 1;
                    let backoff = retry_after.unwrap_or_else(|| self.retry_policy.backoff(retries));
                    let ctx = RetryContext::new(retries, max_retries, error_type, backoff, path);

                    if retries > max_retries {
                        warn!(endpoint = %path, "{}", ctx.format_exhausted());
                        return Err(match error_type {
                            RetryErrorType::RateLimit => FetcherError::RateLimit {
                                message: ctx.format_exhausted(),
                            },
                            RetryErrorType::ServerError(status) => FetcherError::Api {
                                status,
                                message: ctx.format_exhausted(),
                            },
                            other => FetcherError::transport(other.description()),
                        });
                    }

                    warn!("{}", ctx.format_retry());
                    record_retry(error_type.label(), backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One attempt: token, gate slot, send, classify
    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        attempt: u32,
    ) -> FetcherResult<AttemptOutcome> {
        self.rate_limiter.acquire().await;
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| FetcherError::transport(format!("Concurrency gate closed: {e}")))?;

        let timer = RequestTimer::start(path, attempt);
        let mut builder = self.client.request(method.clone(), url).query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                timer.network_error();
                let error_type = extract_error_type(None, Some(&e));
                warn!(endpoint = %path, "Request failed ({}): {}", error_type.description(), e);
                return Err(FetcherError::transport(format!("Network error: {e}")));
            }
        };

        let status = response.status();
        timer.finish(status.as_u16());

        match RetryErrorType::from_status(status) {
            None => Self::read_success(response, path).await.map(AttemptOutcome::Success),
            Some(RetryErrorType::AuthFailed(code)) => {
                let text = response.text().await.unwrap_or_default();
                Err(FetcherError::Authentication {
                    status: code,
                    message: text,
                })
            }
            Some(RetryErrorType::RateLimit) => Ok(AttemptOutcome::Retry {
                error_type: RetryErrorType::RateLimit,
                retry_after: parse_retry_after(response.headers()),
            }),
            Some(error_type) if error_type.is_retryable() => Ok(AttemptOutcome::Retry {
                error_type,
                retry_after: None,
            }),
            Some(_) => {
                let text = response.text().await.unwrap_or_default();
                Err(FetcherError::Api {
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }

    async fn read_success(response: Response, path: &str) -> FetcherResult<Value> {
        let empty = || Value::Object(serde_json::Map::new());

        if response.content_length() == Some(0) {
            return Ok(empty());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("application/json") {
            warn!(
                "Unexpected content type '{}' from {} (HTTP {}), treating as empty",
                content_type,
                path,
                response.status()
            );
            return Ok(empty());
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetcherError::transport(format!("Network error: {e}")))?;
        if text.trim().is_empty() {
            return Ok(empty());
        }

        serde_json::from_str(&text).map_err(|e| {
            debug!(endpoint = %path, "Undecodable body: {}", text);
            FetcherError::Parse(format!("Failed to deserialize response from {path}: {e}"))
        })
    }
}

/// Parse an integer `Retry-After` header (seconds)
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
