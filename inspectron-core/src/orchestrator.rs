//! Single-flight job orchestration.
//!
//! At most one job holds the slot at a time. The slot is claimed inside the
//! same critical section that checks it and creates the job record, and it is
//! released by a drop guard owned by the job task.

use crate::config::{Config, CrawlSettings};
use crate::job::{Job, JobId, JobKind, JobRegistry, JobStatus};
use crate::logs::{JobLogger, LogHub, LogSubscription, StreamConfig};
use crate::scan::{PassiveScanner, Scanner, Vulnerability};
use anyhow::bail;
use inspectron_scanner::{
    CrawlEvent, CrawlOutcome, HtmlLinkExtractor, HttpPageLoader, InteractableElement,
    PaletteLabeler, ProgressCallback, TraversalEngine,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Builds a fresh engine for every crawl job.
pub type EngineFactory = Arc<dyn Fn() -> TraversalEngine + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Crawl { url: String },
    Scan { crawl_job: JobId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Another job is already running: {running}")]
    Busy { running: JobId },

    #[error("Crawl job {0} not found")]
    CrawlNotFound(JobId),

    #[error("Crawl job {id} is not completed (status: {status})")]
    CrawlNotCompleted { id: JobId, status: JobStatus },
}

impl SubmitError {
    /// HTTP status a router should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            SubmitError::Busy { .. } => 409,
            SubmitError::CrawlNotFound(_) => 404,
            SubmitError::CrawlNotCompleted { .. } => 400,
        }
    }
}

/// Engine factory backed by [`HttpPageLoader`] and [`HtmlLinkExtractor`].
pub fn http_engine_factory(settings: &CrawlSettings) -> EngineFactory {
    let settings = settings.clone();
    Arc::new(move || {
        let loader = HttpPageLoader::with_timeout(settings.navigation_timeout())
            .with_user_agent(settings.user_agent.clone());
        let mut engine = TraversalEngine::new(Box::new(loader), Arc::new(HtmlLinkExtractor::new()))
            .with_navigation_timeout(settings.navigation_timeout())
            .with_max_pages(settings.max_pages);
        if settings.label_elements {
            engine = engine.with_labeler(Arc::new(PaletteLabeler::new()));
        }
        engine
    })
}

#[derive(Debug, Default)]
struct State {
    registry: JobRegistry,
    current: Option<JobId>,
}

enum JobWork {
    Crawl { url: String },
    Scan { urls: Vec<String> },
}

enum JobOutput {
    Crawl {
        urls: Vec<String>,
        elements: Vec<InteractableElement>,
    },
    Vulnerabilities(Vec<Vulnerability>),
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the slot when the job task ends, however it ends.
struct SlotGuard {
    id: JobId,
    state: Arc<Mutex<State>>,
    finished: Arc<Notify>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.state);
            let unfinished = state
                .registry
                .get(&self.id)
                .is_some_and(|job| !job.status.is_terminal());
            if unfinished {
                error!("Job {} ended without a result", self.id);
                if let Err(e) = state.registry.fail(&self.id, "job task panicked") {
                    error!("Failed to record job failure: {}", e);
                }
            }
            if state.current == Some(self.id) {
                state.current = None;
            }
        }
        self.finished.notify_waiters();
    }
}

pub struct JobOrchestrator {
    state: Arc<Mutex<State>>,
    logs: Arc<LogHub>,
    engine_factory: EngineFactory,
    scanner: Arc<dyn Scanner>,
    stream_config: StreamConfig,
    finished: Arc<Notify>,
}

impl JobOrchestrator {
    pub fn new(engine_factory: EngineFactory, scanner: Arc<dyn Scanner>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            logs: Arc::new(LogHub::default()),
            engine_factory,
            scanner,
            stream_config: StreamConfig::default(),
            finished: Arc::new(Notify::new()),
        }
    }

    /// HTTP crawling and passive scanning, tuned by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let scanner = PassiveScanner::new(config.scan.request_timeout())?;
        Ok(Self::new(http_engine_factory(&config.crawl), Arc::new(scanner))
            .with_stream_config(config.logs.stream_config())
            .with_history_capacity(config.logs.history_capacity))
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.logs = Arc::new(LogHub::new(capacity));
        self
    }

    /// Validates the request, records the job and claims the slot, then
    /// spawns the work. Must be called from within a tokio runtime.
    pub fn submit(&self, request: JobRequest) -> Result<JobId, SubmitError> {
        let (id, work) = {
            let mut state = lock(&self.state);
            if let Some(running) = state.current {
                return Err(SubmitError::Busy { running });
            }

            let (kind, source_job, work) = match request {
                JobRequest::Crawl { url } => (JobKind::Crawl, None, JobWork::Crawl { url }),
                JobRequest::Scan { crawl_job } => {
                    let crawl = state
                        .registry
                        .get(&crawl_job)
                        .filter(|job| job.kind == JobKind::Crawl)
                        .ok_or(SubmitError::CrawlNotFound(crawl_job))?;
                    if crawl.status != JobStatus::Completed {
                        return Err(SubmitError::CrawlNotCompleted {
                            id: crawl_job,
                            status: crawl.status,
                        });
                    }
                    let urls = crawl.urls.clone();
                    (JobKind::Scan, Some(crawl_job), JobWork::Scan { urls })
                }
            };

            let id = state.registry.create(kind, source_job);
            self.logs.channel(id);
            state.current = Some(id);
            (id, work)
        };

        info!("Submitted job {}", id);

        let guard = SlotGuard {
            id,
            state: Arc::clone(&self.state),
            finished: Arc::clone(&self.finished),
        };
        let logger = self.logs.logger(id);
        let engine_factory = Arc::clone(&self.engine_factory);
        let scanner = Arc::clone(&self.scanner);

        tokio::spawn(run_job(guard, logger, work, engine_factory, scanner));

        Ok(id)
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        lock(&self.state).registry.get(id).cloned()
    }

    pub fn job_count(&self) -> usize {
        lock(&self.state).registry.len()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).current.is_some()
    }

    pub fn current_job(&self) -> Option<JobId> {
        lock(&self.state).current
    }

    /// Resolves once the job is terminal and its slot has been released.
    /// Returns `None` for an unknown id.
    pub async fn wait_for(&self, id: &JobId) -> Option<Job> {
        loop {
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = lock(&self.state);
                let job = state.registry.get(id)?;
                if job.status.is_terminal() && state.current != Some(*id) {
                    return Some(job.clone());
                }
            }

            notified.await;
        }
    }

    pub fn subscribe_logs(&self, id: &JobId) -> Option<LogSubscription> {
        self.logs.subscribe(id, self.stream_config)
    }

    pub fn stream_config(&self) -> StreamConfig {
        self.stream_config
    }
}

async fn run_job(
    guard: SlotGuard,
    logger: JobLogger,
    work: JobWork,
    engine_factory: EngineFactory,
    scanner: Arc<dyn Scanner>,
) {
    let id = guard.id;
    update(&guard, |registry| registry.set_status(&id, JobStatus::Running));

    let result = match work {
        JobWork::Crawl { url } => run_crawl(&logger, &url, engine_factory)
            .await
            .map(|outcome| JobOutput::Crawl {
                urls: outcome.visited_urls(),
                elements: outcome.elements,
            }),
        JobWork::Scan { urls } => run_scan(&logger, &urls, scanner.as_ref())
            .await
            .map(JobOutput::Vulnerabilities),
    };

    match result {
        Ok(JobOutput::Crawl { urls, elements }) => {
            update(&guard, |registry| registry.complete_crawl(&id, urls, elements));
        }
        Ok(JobOutput::Vulnerabilities(vulnerabilities)) => {
            update(&guard, |registry| registry.complete_scan(&id, vulnerabilities));
        }
        Err(e) => {
            logger.error(format!("Job failed: {}", e));
            update(&guard, |registry| registry.fail(&id, e.to_string()));
        }
    }

    debug!("Job {} finished", id);
    drop(guard);
}

fn update<F>(guard: &SlotGuard, f: F)
where
    F: FnOnce(&mut JobRegistry) -> Result<(), crate::job::JobError>,
{
    let mut state = lock(&guard.state);
    if let Err(e) = f(&mut state.registry) {
        error!("Failed to update job {}: {}", guard.id, e);
    }
}

async fn run_crawl(
    logger: &JobLogger,
    url: &str,
    engine_factory: EngineFactory,
) -> anyhow::Result<CrawlOutcome> {
    logger.info(format!("Starting crawl of {}", url));

    let events = logger.clone();
    let callback: ProgressCallback = Arc::new(move |event| match event {
        CrawlEvent::Visiting { url } => events.info(format!("Visiting {}", url)),
        CrawlEvent::Visited {
            url,
            status_code,
            links,
        } => events.info(format!("Visited {} [{}], {} links", url, status_code, links)),
        CrawlEvent::Failed { url, error } => {
            events.warn(format!("Crawl error for {}: {}", url, error))
        }
        CrawlEvent::Discovered { .. } | CrawlEvent::Progress(_) => {}
    });

    let mut engine = engine_factory().with_progress_callback(callback);
    let outcome = engine.run(url).await?;

    logger.info(format!("Crawl completed. Found {} URLs.", outcome.visited.len()));
    if !outcome.elements.is_empty() {
        logger.info(format!(
            "Labeled {} interactable elements",
            outcome.elements.len()
        ));
    }
    Ok(outcome)
}

async fn run_scan(
    logger: &JobLogger,
    urls: &[String],
    scanner: &dyn Scanner,
) -> anyhow::Result<Vec<Vulnerability>> {
    if urls.is_empty() {
        bail!("Crawl job has no URLs");
    }
    logger.info(format!("Starting scan of {} URLs", urls.len()));
    scanner.scan(urls, logger).await
}
