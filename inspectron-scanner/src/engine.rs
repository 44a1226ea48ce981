use crate::canonical::{CanonicalUrl, canonicalize, resolve_on_site};
use crate::error::{CrawlError, Result};
use crate::frontier::Frontier;
use crate::page::{ElementLabeler, LinkExtractor, LoadedPage, PageLoader};
use crate::result::{CrawlOutcome, CrawlStats, FailedPage, InteractableElement};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(40);

/// Progress notifications emitted while a traversal runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    Discovered { url: String },
    Visiting { url: String },
    Visited { url: String, status_code: u16, links: usize },
    Failed { url: String, error: String },
    Progress(CrawlStats),
}

pub type ProgressCallback = Arc<dyn Fn(CrawlEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Breadth-first traversal over same-site links.
///
/// One engine drives one traversal: `start` acquires the page loader, `crawl`
/// walks the site and `close` releases the loader. [`TraversalEngine::run`]
/// wraps all three and always closes.
pub struct TraversalEngine {
    loader: Box<dyn PageLoader>,
    extractor: Arc<dyn LinkExtractor>,
    labeler: Option<Arc<dyn ElementLabeler>>,
    navigation_timeout: Duration,
    max_pages: Option<usize>,
    progress_callback: Option<ProgressCallback>,
    state: EngineState,
}

impl TraversalEngine {
    pub fn new(loader: Box<dyn PageLoader>, extractor: Arc<dyn LinkExtractor>) -> Self {
        Self {
            loader,
            extractor,
            labeler: None,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            max_pages: None,
            progress_callback: None,
            state: EngineState::Idle,
        }
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_labeler(mut self, labeler: Arc<dyn ElementLabeler>) -> Self {
        self.labeler = Some(labeler);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    /// Acquires the page loader. Only valid from `Idle`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != EngineState::Idle {
            return Err(CrawlError::InvalidState(format!(
                "cannot start engine in state {:?}",
                self.state
            )));
        }

        match self.loader.start().await {
            Ok(()) => {
                self.state = EngineState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = EngineState::Failed;
                Err(match e {
                    CrawlError::ResourceAcquisition(_) => e,
                    other => CrawlError::ResourceAcquisition(other.to_string()),
                })
            }
        }
    }

    /// Releases the page loader. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        self.loader.close().await
    }

    /// Starts, crawls and closes. The loader is closed on every exit path.
    pub async fn run(&mut self, seed: &str) -> Result<CrawlOutcome> {
        if let Err(e) = self.start().await {
            if let Err(close_err) = self.close().await {
                warn!("Failed to close page loader: {}", close_err);
            }
            return Err(e);
        }

        let outcome = self.crawl(seed).await;

        if let Err(close_err) = self.close().await {
            warn!("Failed to close page loader: {}", close_err);
        }

        outcome
    }

    /// Walks the site from `seed`. Requires a started engine.
    pub async fn crawl(&mut self, seed: &str) -> Result<CrawlOutcome> {
        if self.state != EngineState::Running {
            return Err(CrawlError::InvalidState(format!(
                "cannot crawl in state {:?}",
                self.state
            )));
        }

        let seed = match canonicalize(seed) {
            Ok(seed) => seed,
            Err(e) => {
                self.state = EngineState::Failed;
                return Err(e);
            }
        };

        info!("Starting crawl of {}", seed);
        let started = Instant::now();

        let mut frontier = Frontier::new();
        frontier.enqueue(seed.clone());
        self.emit(CrawlEvent::Discovered {
            url: seed.to_string(),
        });

        let mut failed = Vec::new();
        let mut elements = Vec::new();

        while frontier.has_pending() {
            if let Some(cap) = self.max_pages
                && frontier.visited_count() >= cap
            {
                info!("Page cap of {} reached", cap);
                break;
            }

            let Some(url) = frontier.dequeue() else {
                break;
            };

            debug!("Visiting {}", url);
            self.emit(CrawlEvent::Visiting {
                url: url.to_string(),
            });

            let loaded = self.load_page(&url).await;
            frontier.mark_visited(url.clone());

            let page = match loaded {
                Ok(page) => page,
                Err(e) if !e.is_page_fault() => {
                    self.state = EngineState::Failed;
                    return Err(e);
                }
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    failed.push(FailedPage {
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                    self.emit(CrawlEvent::Failed {
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                    let stats = Self::stats(&frontier, failed.len(), started);
                    self.emit(CrawlEvent::Progress(stats));
                    continue;
                }
            };

            // Relative links resolve against the page that was served.
            let base = page.base_url();
            let served_on_site =
                CanonicalUrl::from_url(base.clone()).is_ok_and(|served| served.same_site(&seed));
            if !served_on_site {
                info!("{} redirected off-site to {}, not following its links", url, base);
            }

            let hrefs = if served_on_site {
                match self.extractor.find_links(&page).await {
                    Ok(hrefs) => hrefs,
                    Err(e) => {
                        warn!("Link extraction failed for {}: {}", url, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            for href in &hrefs {
                if let Some(link) = resolve_on_site(&base, href, &seed)
                    && frontier.enqueue(link.clone())
                {
                    debug!("Queued {}", link);
                    self.emit(CrawlEvent::Discovered {
                        url: link.to_string(),
                    });
                }
            }

            if served_on_site && let Some(labeler) = self.labeler.clone() {
                elements.extend(
                    Self::label_page(self.extractor.as_ref(), labeler.as_ref(), &page).await,
                );
            }

            self.emit(CrawlEvent::Visited {
                url: url.to_string(),
                status_code: page.status_code,
                links: hrefs.len(),
            });
            let stats = Self::stats(&frontier, failed.len(), started);
            self.emit(CrawlEvent::Progress(stats));
        }

        let stats = Self::stats(&frontier, failed.len(), started);
        info!(
            "Crawl complete. Visited {} pages ({} failed, {} still queued)",
            stats.visited_count, stats.failed_count, stats.queue_depth
        );

        self.state = EngineState::Completed;

        Ok(CrawlOutcome {
            seed,
            visited: frontier.into_visited(),
            failed,
            elements,
            stats,
        })
    }

    async fn load_page(&mut self, url: &CanonicalUrl) -> Result<LoadedPage> {
        match tokio::time::timeout(self.navigation_timeout, self.loader.load(url)).await {
            Ok(result) => result,
            Err(_) => Err(CrawlError::NavigationTimeout {
                url: url.to_string(),
                after: self.navigation_timeout,
            }),
        }
    }

    // No `&self` here: the engine is `Send` but not `Sync`.
    async fn label_page(
        extractor: &dyn LinkExtractor,
        labeler: &dyn ElementLabeler,
        page: &LoadedPage,
    ) -> Vec<InteractableElement> {
        let found = match extractor.find_elements(page).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Element detection failed for {}: {}", page.url, e);
                return Vec::new();
            }
        };

        let mut labeled = Vec::new();
        let mut number = 1;
        for element in &found {
            let Some(color) = labeler.color_for(&element.tag_name) else {
                continue;
            };

            if let Err(e) = labeler.label(page, element, color, number).await {
                warn!("Failed to label {} on {}: {}", element.element_id, page.url, e);
                continue;
            }

            labeled.push(InteractableElement {
                element_id: element.element_id.clone(),
                tag_name: element.tag_name.clone(),
                text_content: element.text.clone(),
                label_number: number,
                url: page.url.to_string(),
            });
            number += 1;
        }

        labeled
    }

    fn stats(frontier: &Frontier, failed: usize, started: Instant) -> CrawlStats {
        CrawlStats {
            total_discovered: frontier.discovered_count(),
            visited_count: frontier.visited_count(),
            queue_depth: frontier.queue_depth(),
            failed_count: failed,
            crawl_rate: CrawlStats::rate(frontier.visited_count(), started.elapsed()),
        }
    }
}
