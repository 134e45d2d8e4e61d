//! Cursor pagination for OpenPhone list endpoints
//!
//! List endpoints answer `{"data": [...], "nextPageToken": "..."}`. The helper
//! repeatedly fetches pages until one comes back empty or carries no token.
//!
//! Includes safety mechanisms:
//! - Maximum iteration limit to prevent infinite loops
//! - Optional `max_count` early exit, checked after every appended item

use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

use crate::fetcher::{FetcherError, FetcherResult};

/// Maximum number of pagination iterations to prevent infinite loops
const MAX_ITERATIONS: usize = 10_000;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in this page
    pub items: Vec<T>,
    /// Cursor of the next page, if any
    pub next_page_token: Option<String>,
    /// Records the server returned, including ones the parser rejected
    pub raw_len: usize,
}

impl<T> Page<T> {
    /// Create a page
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        let raw_len = items.len();
        Self {
            items,
            next_page_token,
            raw_len,
        }
    }

    /// Override the raw record count when some records were dropped while parsing
    pub fn with_raw_len(mut self, raw_len: usize) -> Self {
        self.raw_len = raw_len.max(self.items.len());
        self
    }
}

/// Pagination helper for cursor-based listings
pub struct PaginationHelper;

impl PaginationHelper {
    /// Collect every item across pages
    ///
    /// # Arguments
    /// * `label` - Name used in log lines
    /// * `max_count` - Stop as soon as this many items are held (no further request)
    /// * `fetch_page` - Fetches the page for a cursor (`None` for the first page)
    ///
    /// # Errors
    /// Propagates the first page error, or fails if the iteration cap is exceeded.
    pub async fn collect<T, F, Fut>(
        label: &str,
        max_count: Option<usize>,
        mut fetch_page: F,
    ) -> FetcherResult<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = FetcherResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        if max_count == Some(0) {
            return Ok(items);
        }

        for iteration in 0..MAX_ITERATIONS {
            debug!("Fetching {} page {}", label, iteration + 1);
            let page = fetch_page(cursor.take()).await?;

            // a page of only malformed records still continues the listing
            if page.raw_len == 0 {
                debug!("{}: empty page, {} items collected", label, items.len());
                return Ok(items);
            }

            for item in page.items {
                items.push(item);
                if max_count.is_some_and(|max| items.len() >= max) {
                    debug!("{}: reached max count {}", label, items.len());
                    return Ok(items);
                }
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => cursor = Some(token),
                None => {
                    debug!("{}: last page, {} items collected", label, items.len());
                    return Ok(items);
                }
            }
        }

        Err(FetcherError::Api {
            status: 0,
            message: format!(
                "Max iterations ({MAX_ITERATIONS}) exceeded while paginating {label} - possible infinite loop"
            ),
        })
    }
}

/// Split a list response into a typed page
///
/// Items the parser rejects are skipped with a warning so one malformed record
/// does not discard the whole page.
pub fn parse_page<T>(
    body: &Value,
    mut parse: impl FnMut(&Value) -> FetcherResult<T>,
) -> Page<T> {
    let raw = body.get("data").and_then(Value::as_array);
    let raw_len = raw.map_or(0, Vec::len);
    let items = raw
        .map(|raw| {
            raw.iter()
                .filter_map(|item| match parse(item) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("Skipping malformed record: {}", e);
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let next_page_token = body
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Page::new(items, next_page_token).with_raw_len(raw_len)
}
