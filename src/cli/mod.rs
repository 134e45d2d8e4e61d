//! CLI command implementations

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::downloader::config::{
    RetryPolicy, DEFAULT_MAX_CONCURRENCY, DEFAULT_REQUESTS_PER_SECOND, MAX_RETRIES,
};
use crate::downloader::{ExtractionOptions, RateLimiter};
use crate::fetcher::openphone_config::OPENPHONE_API_CONFIG;
use crate::fetcher::OpenPhoneHttpClient;

pub mod error;
pub mod extract;
pub mod webhook;

pub use error::CliError;
pub use extract::ExtractArgs;
pub use webhook::{EnsureWebhookArgs, WebhookArgs, WebhookCommand};

/// Upper bound for `--max-concurrency`
const MAX_CONCURRENCY: usize = 64;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse a positive, finite requests-per-second value
fn parse_rate(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err("requests per second must be greater than 0".to_string());
    }
    Ok(value)
}

/// OpenPhone workspace extractor
#[derive(Parser, Debug)]
#[command(name = "openphone-data-downloader")]
#[command(about = "Extract users, phone numbers, conversations, calls and messages from OpenPhone", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// OpenPhone API key
    #[arg(long, global = true, env = "OPENPHONE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenPhone API root
    #[arg(long, global = true, env = "OPENPHONE_BASE_URL", default_value = OPENPHONE_API_CONFIG.base_url)]
    pub api_base_url: String,

    /// Sustained request rate shared by every concurrent fetch
    ///
    /// The provider allows 10 requests per second per key.
    #[arg(long, global = true, default_value_t = DEFAULT_REQUESTS_PER_SECOND, value_parser = parse_rate)]
    pub requests_per_second: f64,

    /// Maximum number of requests in flight (max: 64)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONCURRENCY, value_parser = parse_concurrency)]
    pub max_concurrency: usize,

    /// Maximum number of retries for 429 and 5xx responses (range: 0-20)
    #[arg(long, global = true, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// The API key, required by every command
    pub fn require_api_key(&self) -> Result<&str, CliError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CliError::Configuration(
                    "OPENPHONE_API_KEY is not set. Add it to your .env file or pass --api-key."
                        .to_string(),
                )
            })
    }

    /// Retry policy built from `--max-retries`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }

    /// Extraction settings shared by the global flags
    pub fn extraction_options(&self) -> Result<ExtractionOptions, CliError> {
        Ok(ExtractionOptions::new(self.require_api_key()?)
            .with_base_url(self.api_base_url.as_str())
            .with_requests_per_second(self.requests_per_second)
            .with_max_concurrency(self.max_concurrency)
            .with_retry_policy(self.retry_policy()))
    }

    /// HTTP client for commands that talk to the API directly
    pub fn http_client(&self) -> Result<OpenPhoneHttpClient, CliError> {
        let client = OpenPhoneHttpClient::new(
            self.require_api_key()?,
            self.api_base_url.as_str(),
            Arc::new(RateLimiter::new(self.requests_per_second)),
            self.max_concurrency,
        )?;
        Ok(client.with_retry_policy(self.retry_policy()))
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract the workspace into a consolidated JSON document
    Extract(ExtractArgs),

    /// Manage the inbound message webhook
    Webhook(WebhookArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
