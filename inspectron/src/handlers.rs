use anyhow::{Context, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use inspectron_core::api::{CrawlStatusResponse, ScanStatusResponse};
use inspectron_core::job::{Job, JobId, JobKind, JobStatus};
use inspectron_core::logs::StreamEvent;
use inspectron_core::orchestrator::{JobOrchestrator, JobRequest};
use inspectron_core::scan::Severity;
use inspectron_core::Config;
use inspectron_scanner::canonicalize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: bool,
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            quiet: matches.get_flag("quiet"),
            verbose: matches.get_flag("verbose"),
            config: matches.get_one::<PathBuf>("config").cloned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("Unknown report format '{}'", other)),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOverrides {
    pub max_pages: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub label_elements: bool,
}

impl CrawlOverrides {
    pub fn from_matches(sub_matches: &ArgMatches) -> Self {
        Self {
            max_pages: sub_matches.get_one::<usize>("max-pages").copied(),
            timeout_secs: sub_matches.get_one::<u64>("timeout").copied(),
            label_elements: sub_matches
                .try_get_one::<bool>("label-elements")
                .ok()
                .flatten()
                .copied()
                .unwrap_or(false),
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages = Some(max_pages);
        }
        if let Some(timeout) = self.timeout_secs {
            config.crawl.navigation_timeout_secs = timeout;
        }
        if self.label_elements {
            config.crawl.label_elements = true;
        }
    }
}

/// Sets up the fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Canonical form of a seed given on the command line.
pub fn parse_seed(raw: &str) -> Result<String, String> {
    canonicalize(raw)
        .map(|url| url.to_string())
        .map_err(|e| e.to_string())
}

/// Path component of a URL, `/` when empty.
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| u.path().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string())
}

fn new_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Streams a job's log lines until the job is finished, then returns its
/// final record. Lines are printed above the spinner on stderr.
pub async fn follow_job(orchestrator: &JobOrchestrator, id: &JobId, quiet: bool) -> Option<Job> {
    let spinner = new_spinner(quiet);
    spinner.set_message(format!("Job {} running", id));

    let done = orchestrator.wait_for(id);
    tokio::pin!(done);

    let mut subscription = orchestrator.subscribe_logs(id);

    let job = loop {
        let Some(active) = subscription.as_mut() else {
            break done.await;
        };

        tokio::select! {
            biased;
            job = &mut done => {
                for line in active.drain_pending() {
                    if !quiet {
                        spinner.println(line);
                    }
                }
                break job;
            }
            event = active.next_event() => match event {
                Some(StreamEvent::Line(line)) => {
                    if !quiet {
                        spinner.println(line);
                    }
                }
                Some(StreamEvent::KeepAlive) => spinner.tick(),
                Some(StreamEvent::Inactive(notice)) => {
                    spinner.set_message(notice);
                }
                None => subscription = None,
            }
        }
    };

    spinner.finish_and_clear();
    job
}

async fn run_job(
    orchestrator: &JobOrchestrator,
    request: JobRequest,
    quiet: bool,
) -> anyhow::Result<Job> {
    let id = orchestrator.submit(request)?;
    let job = follow_job(orchestrator, &id, quiet)
        .await
        .ok_or_else(|| anyhow!("Job {} disappeared", id))?;

    match job.status {
        JobStatus::Completed => Ok(job),
        _ => Err(anyhow!(
            "{} job {} failed: {}",
            job.kind.as_str(),
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        )),
    }
}

/// Submits a crawl and follows it to completion.
pub async fn run_crawl(
    orchestrator: &JobOrchestrator,
    url: &str,
    quiet: bool,
) -> anyhow::Result<Job> {
    run_job(
        orchestrator,
        JobRequest::Crawl {
            url: url.to_string(),
        },
        quiet,
    )
    .await
}

/// Crawls `url`, then scans the pages the crawl visited.
pub async fn run_scan(
    orchestrator: &JobOrchestrator,
    url: &str,
    quiet: bool,
) -> anyhow::Result<Job> {
    let crawl = run_crawl(orchestrator, url, quiet).await?;
    run_job(
        orchestrator,
        JobRequest::Scan {
            crawl_job: crawl.id,
        },
        quiet,
    )
    .await
}

fn status_colored(status: JobStatus) -> String {
    match status {
        JobStatus::Completed => status.as_str().green().bold().to_string(),
        JobStatus::Failed => status.as_str().red().bold().to_string(),
        _ => status.as_str().yellow().to_string(),
    }
}

pub fn generate_crawl_report(job: &Job) -> String {
    let mut report = String::new();
    report.push_str(&format!("{}\n\n", "━".repeat(52).bright_blue()));
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Job: {}\n", job.id));
    report.push_str(&format!("  Status: {}\n", status_colored(job.status)));
    report.push_str(&format!("  Pages visited: {}\n", job.urls.len()));
    if let Some(ref error) = job.error {
        report.push_str(&format!("  Error: {}\n", error.red()));
    }
    report.push_str(&format!("\n{}\n\n", "━".repeat(52).bright_blue()));

    // Visit order is kept; hosts appear in order of first visit.
    let mut hosts: Vec<(String, Vec<String>)> = Vec::new();
    for url in &job.urls {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        let path = extract_url_path(url);
        match hosts.iter_mut().find(|(h, _)| *h == host) {
            Some((_, paths)) => paths.push(path),
            None => hosts.push((host, vec![path])),
        }
    }

    for (host, paths) in &hosts {
        report.push_str(&format!("## {}\n", host.bright_white().bold()));
        report.push_str(&format!("  {} pages\n\n", paths.len()));
        for path in paths {
            report.push_str(&format!("  {} {}\n", "✓".green(), path));
        }
        report.push('\n');
    }

    if !job.elements.is_empty() {
        report.push_str(&format!("## {}\n", "Interactable elements".bright_white().bold()));
        report.push_str(&format!("  {} labeled\n\n", job.elements.len()));
        for element in &job.elements {
            report.push_str(&format!(
                "  #{} <{}> {} on {}\n",
                element.label_number,
                element.tag_name,
                element.text_content.trim(),
                extract_url_path(&element.url)
            ));
        }
        report.push('\n');
    }

    report
}

fn severity_colored(severity: Severity) -> String {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.bright_red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.blue().to_string(),
    }
}

pub fn generate_scan_report(job: &Job) -> String {
    let mut report = String::new();
    report.push_str(&format!("{}\n\n", "━".repeat(52).bright_blue()));
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Job: {}\n", job.id));
    if let Some(source) = job.source_job {
        report.push_str(&format!("  Crawl job: {}\n", source));
    }
    report.push_str(&format!("  Status: {}\n", status_colored(job.status)));
    report.push_str(&format!(
        "  Vulnerabilities found: {}\n",
        job.vulnerabilities.len()
    ));

    let mut counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for vuln in &job.vulnerabilities {
        *counts.entry(vuln.severity).or_default() += 1;
    }
    for (severity, count) in counts.iter().rev() {
        report.push_str(&format!("    {}: {}\n", severity_colored(*severity), count));
    }
    if let Some(ref error) = job.error {
        report.push_str(&format!("  Error: {}\n", error.red()));
    }
    report.push_str(&format!("\n{}\n\n", "━".repeat(52).bright_blue()));

    let mut ordered: Vec<_> = job.vulnerabilities.iter().collect();
    ordered.sort_by(|a, b| b.severity.cmp(&a.severity));

    for vuln in ordered {
        report.push_str(&format!(
            "[{}] {}\n",
            severity_colored(vuln.severity),
            vuln.title.bold()
        ));
        report.push_str(&format!("  URL: {}\n", vuln.url));
        report.push_str(&format!("  {}\n", vuln.description));
        if let Some(ref recommendation) = vuln.recommendation {
            report.push_str(&format!("  {} {}\n", "→".blue(), recommendation));
        }
        report.push('\n');
    }

    report
}

/// Status response body for the job, pretty-printed.
pub fn render_json(job: &Job) -> anyhow::Result<String> {
    let json = match job.kind {
        JobKind::Crawl => serde_json::to_string_pretty(&CrawlStatusResponse::from(job))?,
        JobKind::Scan => serde_json::to_string_pretty(&ScanStatusResponse::from(job))?,
    };
    Ok(json)
}

fn load_config(global: &GlobalOptions, overrides: &CrawlOverrides) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(global.config.as_deref())?;
    overrides.apply(&mut config);
    debug!("Effective config: {:?}", config);
    Ok(config)
}

fn report_format(sub_matches: &ArgMatches) -> anyhow::Result<ReportFormat> {
    sub_matches
        .get_one::<String>("format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()
        .map_err(|e| anyhow!(e))
        .map(|f| f.unwrap_or(ReportFormat::Text))
}

fn seed_argument(sub_matches: &ArgMatches) -> anyhow::Result<String> {
    let raw = sub_matches
        .get_one::<String>("url")
        .context("--url is required")?;
    parse_seed(raw).map_err(|e| anyhow!(e))
}

fn print_job(job: &Job, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Json => println!("{}", render_json(job)?),
        ReportFormat::Text => match job.kind {
            JobKind::Crawl => print!("{}", generate_crawl_report(job)),
            JobKind::Scan => print!("{}", generate_scan_report(job)),
        },
    }
    Ok(())
}

pub async fn handle_crawl(sub_matches: &ArgMatches, global: &GlobalOptions) -> anyhow::Result<()> {
    let url = seed_argument(sub_matches)?;
    let format = report_format(sub_matches)?;
    let config = load_config(global, &CrawlOverrides::from_matches(sub_matches))?;
    let orchestrator = JobOrchestrator::from_config(&config)?;

    if !global.quiet {
        eprintln!("{} Crawling {}", "→".blue(), url.bright_white());
        if let Some(max_pages) = config.crawl.max_pages {
            eprintln!("{} Page cap: {}", "→".blue(), max_pages);
        }
    }

    let job = run_crawl(&orchestrator, &url, global.quiet).await?;

    if !global.quiet {
        eprintln!("{} Crawl complete!", "✓".green().bold());
    }
    print_job(&job, format)
}

pub async fn handle_scan(sub_matches: &ArgMatches, global: &GlobalOptions) -> anyhow::Result<()> {
    let url = seed_argument(sub_matches)?;
    let format = report_format(sub_matches)?;
    let config = load_config(global, &CrawlOverrides::from_matches(sub_matches))?;
    let orchestrator = JobOrchestrator::from_config(&config)?;

    if !global.quiet {
        eprintln!("{} Crawling then scanning {}", "→".blue(), url.bright_white());
    }

    let job = run_scan(&orchestrator, &url, global.quiet).await?;

    if !global.quiet {
        eprintln!("{} Scan complete!", "✓".green().bold());
    }
    print_job(&job, format)
}
