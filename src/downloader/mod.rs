//! Extraction pipeline, rate limiting and consolidation
//!
//! # Overview
//!
//! 1. **Fetching**: [`orchestrator::FetchOrchestrator`] walks users, phone numbers,
//!    conversations, calls, transcripts and messages with concurrent fan-out
//! 2. **Rate Limiting**: every request draws from one [`rate_limit::RateLimiter`]
//! 3. **Failure Isolation**: non-fatal errors land in a
//!    [`failures::FailureAggregator`] with the parameters needed to retry them
//! 4. **Consolidation**: [`consolidate::consolidate`] folds per-user records into
//!    the output document
//!
//! # Quick Start
//!
//! ```no_run
//! use openphone_data_downloader::downloader::{generate_phone_data, ExtractionOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = generate_phone_data(ExtractionOptions::new("my-api-key")).await?;
//! if let Some(report) = &outcome.failure_report {
//!     eprintln!("{} items failed", report.total_failed);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Only authentication failures and a failed user listing surface as
//! [`ExtractError`]. Everything else is recorded in the failure report and the
//! run still writes its consolidated output.

pub mod config;
pub mod consolidate;
pub mod failures;
pub mod orchestrator;
pub mod rate_limit;

pub use consolidate::{consolidate, ConsolidatedPhoneData, UserPhoneData};
pub use failures::{FailureAggregator, FailureCategory, FailureRecord, FailureReport};
pub use orchestrator::FetchOrchestrator;
pub use rate_limit::RateLimiter;

use chrono::{SecondsFormat, Utc};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::downloader::config::{
    RetryPolicy, DEFAULT_FAILED_OUTPUT_PATH, DEFAULT_MAX_CONCURRENCY, DEFAULT_OUTPUT_PATH,
    DEFAULT_REQUESTS_PER_SECOND,
};
use crate::fetcher::openphone_config::OPENPHONE_API_CONFIG;
use crate::fetcher::{FetcherError, OpenPhoneFetcher, OpenPhoneHttpClient, PhoneDataFetcher};
use crate::output::{write_json, OutputError};

/// Extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Authentication failure or failed user listing
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// Output could not be written
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Settings of one extraction run
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// API key sent as the `Authorization` header
    pub api_key: String,
    /// API root
    pub base_url: String,
    /// Stop the user listing after this many users
    pub max_count: Option<usize>,
    /// Consolidated document destination
    pub output_path: PathBuf,
    /// Failure report destination (written only when something failed)
    pub failed_output_path: PathBuf,
    /// Token bucket rate
    pub requests_per_second: f64,
    /// Maximum requests in flight
    pub max_concurrency: usize,
    /// Retry behaviour for 429/5xx
    pub retry_policy: RetryPolicy,
}

impl ExtractionOptions {
    /// Defaults for everything but the key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENPHONE_API_CONFIG.base_url.to_string(),
            max_count: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            failed_output_path: PathBuf::from(DEFAULT_FAILED_OUTPUT_PATH),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Cap the number of users
    pub fn with_max_count(mut self, max_count: Option<usize>) -> Self {
        self.max_count = max_count;
        self
    }

    /// Set the consolidated document destination
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Set the failure report destination
    pub fn with_failed_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.failed_output_path = path.into();
        self
    }

    /// Set the token bucket rate
    pub fn with_requests_per_second(mut self, requests_per_second: f64) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Set the in-flight request cap
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Build the HTTP client these options describe
    pub fn http_client(&self) -> Result<OpenPhoneHttpClient, FetcherError> {
        let limiter = Arc::new(RateLimiter::new(self.requests_per_second));
        Ok(OpenPhoneHttpClient::new(
            &self.api_key,
            self.base_url.as_str(),
            limiter,
            self.max_concurrency,
        )?
        .with_retry_policy(self.retry_policy))
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The consolidated document as written
    pub consolidated: ConsolidatedPhoneData,
    /// Failure report, present only when something failed
    pub failure_report: Option<FailureReport>,
    /// Where the consolidated document was written
    pub output_path: PathBuf,
    /// Where the failure report was written, if it was
    pub failed_output_path: Option<PathBuf>,
}

/// Extract the whole workspace and write the output files
pub async fn generate_phone_data(options: ExtractionOptions) -> Result<ExtractionOutcome, ExtractError> {
    let fetcher = OpenPhoneFetcher::new(options.http_client()?);
    run_extraction(Arc::new(fetcher), &options, None).await
}

/// Run the pipeline over any fetcher and write the output files
///
/// `progress`, if given, advances once per completed user.
pub async fn run_extraction(
    fetcher: Arc<dyn PhoneDataFetcher>,
    options: &ExtractionOptions,
    progress: Option<ProgressBar>,
) -> Result<ExtractionOutcome, ExtractError> {
    let span = info_span!("extract", max_count = ?options.max_count);
    async move {
        let failures = Arc::new(FailureAggregator::new());
        let mut orchestrator = FetchOrchestrator::new(fetcher, failures.clone());
        if let Some(progress) = progress {
            orchestrator = orchestrator.with_progress(progress);
        }

        let user_data = orchestrator.run(options.max_count).await?;

        let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let consolidated = consolidate(user_data, generated_at.clone());
        write_json(&options.output_path, &consolidated)?;
        info!(
            users = consolidated.total_users,
            conversations = consolidated.total_conversations,
            calls = consolidated.total_calls,
            messages = consolidated.total_messages,
            transcripts = consolidated.total_transcripts,
            "Wrote consolidated data to {}",
            options.output_path.display()
        );

        let failure_report = FailureReport::from_snapshot(failures.snapshot().await, generated_at);
        let failed_output_path = match &failure_report {
            Some(report) => {
                write_json(&options.failed_output_path, report)?;
                warn!(
                    "{} items failed to fetch. Details saved to {}",
                    report.total_failed,
                    options.failed_output_path.display()
                );
                warn!("Breakdown: {}", report.breakdown());
                Some(options.failed_output_path.clone())
            }
            None => {
                info!("All items fetched successfully, no failures");
                None
            }
        };

        Ok(ExtractionOutcome {
            consolidated,
            failure_report,
            output_path: options.output_path.clone(),
            failed_output_path,
        })
    }
    .instrument(span)
    .await
}
