use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load {url}: {reason}")]
    PageLoad { url: String, reason: String },

    #[error("Navigation to {url} timed out after {}s", .after.as_secs())]
    NavigationTimeout { url: String, after: Duration },

    #[error("Failed to acquire page loader: {0}")]
    ResourceAcquisition(String),

    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl CrawlError {
    /// Page-level faults are recovered by the traversal loop; everything else
    /// aborts the traversal.
    pub fn is_page_fault(&self) -> bool {
        matches!(
            self,
            CrawlError::PageLoad { .. }
                | CrawlError::NavigationTimeout { .. }
                | CrawlError::ParseError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
