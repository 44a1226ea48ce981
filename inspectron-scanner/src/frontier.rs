use crate::canonical::CanonicalUrl;
use std::collections::{HashSet, VecDeque};

/// BFS frontier: pending URLs in discovery order plus everything already
/// visited.
///
/// A URL is queued at most once for the lifetime of the frontier and never
/// sits in the queue and the visited set at the same time.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<CanonicalUrl>,
    queued: HashSet<CanonicalUrl>,
    visited: HashSet<CanonicalUrl>,
    visit_order: Vec<CanonicalUrl>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `url` is neither visited nor already queued.
    pub fn can_enqueue(&self, url: &CanonicalUrl) -> bool {
        !self.visited.contains(url) && !self.queued.contains(url)
    }

    /// Appends `url` if it has never been seen. Returns whether it was added.
    pub fn enqueue(&mut self, url: CanonicalUrl) -> bool {
        if !self.can_enqueue(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    /// Removes and returns the oldest queued URL.
    pub fn dequeue(&mut self) -> Option<CanonicalUrl> {
        let url = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }

    /// Records `url` as visited. Returns false if it was already visited.
    pub fn mark_visited(&mut self, url: CanonicalUrl) -> bool {
        if !self.visited.insert(url.clone()) {
            return false;
        }
        self.visit_order.push(url);
        true
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Every URL the frontier has ever accepted.
    pub fn discovered_count(&self) -> usize {
        self.visited.len() + self.queued.len()
    }

    /// Visited URLs in the order they were visited.
    pub fn visited(&self) -> &[CanonicalUrl] {
        &self.visit_order
    }

    pub fn into_visited(self) -> Vec<CanonicalUrl> {
        self.visit_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    fn url(s: &str) -> CanonicalUrl {
        canonicalize(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.enqueue(url("http://site.test/"));
        frontier.enqueue(url("http://site.test/a"));
        frontier.enqueue(url("http://site.test/b"));

        assert_eq!(frontier.dequeue(), Some(url("http://site.test/")));
        assert_eq!(frontier.dequeue(), Some(url("http://site.test/a")));
        assert_eq!(frontier.dequeue(), Some(url("http://site.test/b")));
        assert_eq!(frontier.dequeue(), None);
        assert!(!frontier.has_pending());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut frontier = Frontier::new();
        assert!(frontier.enqueue(url("http://site.test/a")));
        assert!(!frontier.enqueue(url("http://site.test/a/")));
        assert_eq!(frontier.queue_depth(), 1);
    }

    #[test]
    fn test_visited_url_is_never_requeued() {
        let mut frontier = Frontier::new();
        let a = url("http://site.test/a");
        frontier.enqueue(a.clone());
        let next = frontier.dequeue().unwrap();
        frontier.mark_visited(next);

        assert!(!frontier.can_enqueue(&a));
        assert!(!frontier.enqueue(a.clone()));
        assert!(!frontier.has_pending());
        assert!(frontier.is_visited(&a));
    }

    #[test]
    fn test_visited_and_queued_are_disjoint() {
        let mut frontier = Frontier::new();
        for path in ["/", "/a", "/b", "/c"] {
            frontier.enqueue(url(&format!("http://site.test{}", path)));
        }
        while let Some(next) = frontier.dequeue() {
            frontier.mark_visited(next.clone());
            frontier.enqueue(next);
            frontier.enqueue(url("http://site.test/a"));
            assert!(frontier.visited().iter().all(|v| !frontier.queued.contains(v)));
        }
        assert_eq!(frontier.visited_count(), 4);
        assert_eq!(frontier.discovered_count(), 4);
    }

    #[test]
    fn test_visit_order_is_recorded() {
        let mut frontier = Frontier::new();
        frontier.mark_visited(url("http://site.test/b"));
        frontier.mark_visited(url("http://site.test/a"));
        assert!(!frontier.mark_visited(url("http://site.test/b")));

        let visited: Vec<String> = frontier.into_visited().into_iter().map(String::from).collect();
        assert_eq!(visited, vec!["http://site.test/b", "http://site.test/a"]);
    }
}
