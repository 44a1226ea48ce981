use crate::canonical::CanonicalUrl;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A page element recorded while labeling is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractableElement {
    pub element_id: String,
    pub tag_name: String,
    pub text_content: String,
    pub label_number: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub total_discovered: usize,
    pub visited_count: usize,
    pub queue_depth: usize,
    pub failed_count: usize,
    /// Pages per second since the traversal started.
    pub crawl_rate: f64,
}

impl CrawlStats {
    pub(crate) fn rate(visited: usize, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            ((visited as f64 / secs) * 100.0).round() / 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub seed: CanonicalUrl,
    /// Every visited URL in visit order, failed pages included.
    pub visited: Vec<CanonicalUrl>,
    pub failed: Vec<FailedPage>,
    pub elements: Vec<InteractableElement>,
    pub stats: CrawlStats,
}

impl CrawlOutcome {
    pub fn visited_urls(&self) -> Vec<String> {
        self.visited.iter().map(|u| u.to_string()).collect()
    }
}
