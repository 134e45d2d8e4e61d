//! CLI error types and conversions

use crate::downloader::ExtractError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Extraction error
    #[error("extraction error: {0}")]
    ExtractError(#[from] ExtractError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CliError {
    /// The fetcher error behind this failure, if any
    pub fn fetcher_error(&self) -> Option<&FetcherError> {
        match self {
            Self::FetcherError(e) | Self::ExtractError(ExtractError::Fetcher(e)) => Some(e),
            _ => None,
        }
    }

    /// Whether the API rejected the credentials
    pub fn is_authentication(&self) -> bool {
        self.fetcher_error().is_some_and(FetcherError::is_fatal)
    }
}
