//! Extract command implementation

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use super::{Cli, CliError, OutputFormat};
use crate::downloader::config::{DEFAULT_FAILED_OUTPUT_PATH, DEFAULT_OUTPUT_PATH};
use crate::downloader::{run_extraction, ExtractionOutcome, FailureCategory};
use crate::fetcher::retry_formatter::RetryErrorType;
use crate::fetcher::OpenPhoneFetcher;

/// Extract command arguments
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Maximum number of users to fetch (default: all)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_count: Option<u64>,

    /// Consolidated output JSON file
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Failure report JSON file (written only when something failed)
    #[arg(long, default_value = DEFAULT_FAILED_OUTPUT_PATH)]
    pub failed_output: PathBuf,
}

impl ExtractArgs {
    /// Execute the extract command
    pub async fn execute(&self, cli: &Cli) -> Result<ExtractionOutcome, CliError> {
        let max_count = self
            .max_count
            .map(usize::try_from)
            .transpose()
            .map_err(|e| CliError::InvalidArgument(format!("--max-count: {e}")))?;

        let options = cli
            .extraction_options()?
            .with_max_count(max_count)
            .with_output_path(self.output.clone())
            .with_failed_output_path(self.failed_output.clone());
        let fetcher = Arc::new(OpenPhoneFetcher::new(options.http_client()?));

        let progress = match cli.output_format {
            OutputFormat::Human => create_progress_bar(),
            OutputFormat::Json => ProgressBar::hidden(),
        };

        info!(
            max_count = ?max_count,
            requests_per_second = options.requests_per_second,
            max_concurrency = options.max_concurrency,
            "Starting extraction"
        );

        let result = run_extraction(fetcher, &options, Some(progress.clone())).await;
        progress.finish_and_clear();

        match cli.output_format {
            OutputFormat::Json => output_json(&result),
            OutputFormat::Human => output_human(&result),
        }

        result.map_err(CliError::from)
    }
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} users {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message("Extracting");
    pb
}

fn output_json(result: &Result<ExtractionOutcome, crate::downloader::ExtractError>) {
    let output = match result {
        Ok(outcome) => {
            let consolidated = &outcome.consolidated;
            let failures: serde_json::Map<String, serde_json::Value> = FailureCategory::ALL
                .iter()
                .map(|category| {
                    let count = outcome
                        .failure_report
                        .as_ref()
                        .map_or(0, |report| report.count(*category));
                    (category.as_str().to_string(), serde_json::json!(count))
                })
                .collect();

            serde_json::json!({
                "success": true,
                "output_path": outcome.output_path.display().to_string(),
                "failed_output_path": outcome
                    .failed_output_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                "total_users": consolidated.total_users,
                "total_conversations": consolidated.total_conversations,
                "total_calls": consolidated.total_calls,
                "total_messages": consolidated.total_messages,
                "total_transcripts": consolidated.total_transcripts,
                "total_failed": outcome.failure_report.as_ref().map_or(0, |r| r.total_failed),
                "failures": failures,
            })
        }
        Err(e) => serde_json::json!({
            "success": false,
            "error": e.to_string(),
        }),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => error!("Failed to render JSON output: {}", e),
    }
}

fn output_human(result: &Result<ExtractionOutcome, crate::downloader::ExtractError>) {
    match result {
        Ok(outcome) => {
            let consolidated = &outcome.consolidated;
            println!("\nExtraction completed!");
            println!("Output: {}", outcome.output_path.display());
            println!("Users: {}", consolidated.total_users);
            println!("Conversations: {}", consolidated.total_conversations);
            println!("Calls: {}", consolidated.total_calls);
            println!("Transcripts: {}", consolidated.total_transcripts);
            println!("Messages: {}", consolidated.total_messages);

            if let (Some(report), Some(path)) =
                (&outcome.failure_report, &outcome.failed_output_path)
            {
                println!(
                    "\n{} items failed to fetch ({}). Retry parameters saved to {}",
                    report.total_failed,
                    report.breakdown(),
                    path.display()
                );
            }
        }
        Err(e) => {
            eprintln!("\nExtraction failed!");
            eprintln!("Error: {e}");
            if let crate::downloader::ExtractError::Fetcher(fetch_error) = e {
                if let Some(error_type) =
                    reqwest::StatusCode::from_u16(fetch_error.status())
                        .ok()
                        .and_then(RetryErrorType::from_status)
                {
                    eprintln!("Suggestion: {}", error_type.suggestion());
                }
            }
        }
    }
}
