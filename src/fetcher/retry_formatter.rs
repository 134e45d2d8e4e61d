//! Response classification and retry message formatting for the OpenPhone client.
//!
//! The HTTP client classifies every non-2xx outcome into a [`RetryErrorType`],
//! which decides whether the attempt is retried and supplies the wording used
//! in retry and failure log lines.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Why an attempt did not produce a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// The attempt exceeded the request timeout
    NetworkTimeout,
    /// No connection could be established
    NetworkOffline,
    /// 429 Too Many Requests
    RateLimit,
    /// 500, 502, 503 or 504
    ServerError(u16),
    /// 401 or 403; the key was rejected
    AuthFailed(u16),
    /// Any other status >= 400
    HttpError(u16),
    /// Transport failure that is neither a timeout nor a connect error
    NetworkGeneric,
}

impl RetryErrorType {
    /// Classify an HTTP status. Returns `None` for non-error statuses.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            401 | 403 => Some(Self::AuthFailed(status.as_u16())),
            429 => Some(Self::RateLimit),
            code @ (500 | 502 | 503 | 504) => Some(Self::ServerError(code)),
            code if code >= 400 => Some(Self::HttpError(code)),
            _ => None,
        }
    }

    /// Short reason used inside retry log lines
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "request timed out",
            Self::NetworkOffline => "could not reach the OpenPhone API",
            Self::RateLimit => "rate limited (429)",
            Self::ServerError(code) | Self::AuthFailed(code) | Self::HttpError(code) => {
                StatusCode::from_u16(*code)
                    .ok()
                    .and_then(|status| status.canonical_reason())
                    .unwrap_or("unexpected status")
            }
            Self::NetworkGeneric => "transport error",
        }
    }

    /// Suggested remediation presented after a final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout | Self::NetworkOffline => {
                "Check that api.openphone.com is reachable from this machine"
            }
            Self::RateLimit => "Lower --requests-per-second or retry the failed items later",
            Self::ServerError(_) => "OpenPhone may be experiencing issues, try again later",
            Self::AuthFailed(_) => "Verify OPENPHONE_API_KEY and its workspace permissions",
            Self::HttpError(_) => "Review the request parameters recorded in the failure report",
            Self::NetworkGeneric => "Retry the failed items once the connection is stable",
        }
    }

    /// Metric label for the retry reason
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ServerError(_) => "server_error",
            Self::AuthFailed(_) => "auth",
            Self::HttpError(_) => "http_error",
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric => "network",
        }
    }

    /// Whether the attempt is retried with backoff.
    ///
    /// Only 429 and the transient 5xx statuses are retried; transport failures
    /// and every other status fail immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError(_))
    }
}

/// One scheduled (or abandoned) retry of an endpoint, for log and error text.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Retry number, 1-based
    pub retry: u32,
    /// Configured retry cap
    pub max_retries: u32,
    /// Why the previous attempt failed
    pub error_type: RetryErrorType,
    /// Sleep before the next attempt
    pub backoff: Duration,
    /// Relative endpoint path
    pub endpoint: String,
}

impl RetryContext {
    /// Describe retry `retry` of `endpoint`
    pub fn new(
        retry: u32,
        max_retries: u32,
        error_type: RetryErrorType,
        backoff: Duration,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            retry,
            max_retries,
            error_type,
            backoff,
            endpoint: endpoint.into(),
        }
    }

    /// `Retrying calls (attempt 2/5) after Service Unavailable - waiting 4.0 seconds...`
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying {} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.endpoint,
            self.retry,
            self.max_retries,
            self.error_type.description(),
            self.backoff.as_secs_f64()
        )
    }

    /// Logged when an attempt after at least one retry succeeds
    pub fn format_success(&self) -> String {
        format!(
            "{} succeeded after {} of {} retries",
            self.endpoint, self.retry, self.max_retries
        )
    }

    /// Message of the error returned once the retry cap is exceeded
    pub fn format_exhausted(&self) -> String {
        match self.error_type {
            RetryErrorType::RateLimit => "Rate limit exceeded after max retries.".to_string(),
            RetryErrorType::ServerError(code) => format!(
                "Server error ({code}) persisted after {} retries.",
                self.max_retries
            ),
            other => format!(
                "{} persisted after {} retries.",
                other.description(),
                self.max_retries
            ),
        }
    }
}

/// Classify an attempt from its status, or from the transport error when
/// there was no response.
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&ReqwestError>,
) -> RetryErrorType {
    status
        .and_then(RetryErrorType::from_status)
        .unwrap_or(match err {
            Some(e) if e.is_timeout() => RetryErrorType::NetworkTimeout,
            Some(e) if e.is_connect() => RetryErrorType::NetworkOffline,
            _ => RetryErrorType::NetworkGeneric,
        })
}
