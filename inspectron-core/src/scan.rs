// Passive vulnerability checks over a completed crawl's URL list

use crate::logs::JobLogger;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub url: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recommendation: Option<String>,
}

/// Vulnerability-scanning collaborator run by scan jobs.
pub trait Scanner: Send + Sync {
    fn scan<'a>(
        &'a self,
        urls: &'a [String],
        log: &'a JobLogger,
    ) -> BoxFuture<'a, anyhow::Result<Vec<Vulnerability>>>;
}

/// What the checks see of one fetched URL. Header names are lower-case.
#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
}

impl ResponseSnapshot {
    pub fn new(url: impl Into<String>, status_code: u16) -> Self {
        Self {
            url: url.into(),
            status_code,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html"))
    }
}

const SECURITY_HEADERS: &[(&str, Severity, &str, &str)] = &[
    (
        "Strict-Transport-Security",
        Severity::High,
        "Missing HSTS header",
        "Add a Strict-Transport-Security header",
    ),
    (
        "X-Frame-Options",
        Severity::Medium,
        "Missing X-Frame-Options header",
        "Add an X-Frame-Options header to prevent clickjacking attacks",
    ),
    (
        "X-Content-Type-Options",
        Severity::Medium,
        "Missing X-Content-Type-Options header",
        "Add X-Content-Type-Options: nosniff",
    ),
    (
        "Content-Security-Policy",
        Severity::High,
        "Missing Content-Security-Policy header",
        "Implement a strong Content Security Policy",
    ),
    (
        "X-XSS-Protection",
        Severity::Low,
        "Missing X-XSS-Protection header",
        "Add an X-XSS-Protection header",
    ),
];

const INTERESTING_PATHS: &[(&str, &str, Severity)] = &[
    (".git/", "Git Repository Exposed", Severity::High),
    (".env", "Environment File Exposed", Severity::Critical),
    ("/.aws/", "AWS Credentials Directory", Severity::Critical),
    ("/backup", "Backup File Accessible", Severity::Medium),
    (".sql", "SQL Dump File", Severity::High),
    (".bak", "Backup File", Severity::Medium),
    ("web.config", "Configuration File Exposed", Severity::High),
    ("phpinfo.php", "PHP Info Page", Severity::Low),
];

/// Missing security headers on successful HTML responses.
pub fn check_security_headers(response: &ResponseSnapshot) -> Vec<Vulnerability> {
    if !response.is_success() || !response.is_html() {
        return Vec::new();
    }

    SECURITY_HEADERS
        .iter()
        .filter(|(name, ..)| {
            response
                .headers
                .get(&name.to_lowercase())
                .is_none_or(|v| v.trim().is_empty())
        })
        .map(|(name, severity, description, recommendation)| Vulnerability {
            url: response.url.clone(),
            title: format!("Missing {} Header", name),
            description: description.to_string(),
            severity: *severity,
            recommendation: Some(recommendation.to_string()),
        })
        .collect()
}

/// Plain HTTP to anything but a loopback host.
pub fn check_insecure_transport(response: &ResponseSnapshot) -> Vec<Vulnerability> {
    let Ok(parsed) = Url::parse(&response.url) else {
        return Vec::new();
    };
    if parsed.scheme() != "http" {
        return Vec::new();
    }
    match parsed.host_str() {
        Some(host) if !host.starts_with("127.") && host != "localhost" => {
            vec![Vulnerability {
                url: response.url.clone(),
                title: "Insecure Transport (HTTP)".to_string(),
                description: format!(
                    "The endpoint {} is served over HTTP instead of HTTPS.",
                    response.url
                ),
                severity: Severity::High,
                recommendation: Some("Enable HTTPS for all pages".to_string()),
            }]
        }
        _ => Vec::new(),
    }
}

/// Sensitive files or directories that answered with a 2xx. One per URL.
pub fn check_interesting_files(response: &ResponseSnapshot) -> Vec<Vulnerability> {
    if !response.is_success() {
        return Vec::new();
    }
    let Ok(parsed) = Url::parse(&response.url) else {
        return Vec::new();
    };
    let path = parsed.path().to_lowercase();

    INTERESTING_PATHS
        .iter()
        .find(|(pattern, ..)| path.contains(pattern))
        .map(|(_, title, severity)| Vulnerability {
            url: response.url.clone(),
            title: title.to_string(),
            description: format!(
                "Discovered potentially sensitive file or directory: {}",
                response.url
            ),
            severity: *severity,
            recommendation: Some(
                "Review if this resource should be publicly accessible.".to_string(),
            ),
        })
        .into_iter()
        .collect()
}

pub fn check_error_responses(response: &ResponseSnapshot) -> Vec<Vulnerability> {
    if !(500..600).contains(&response.status_code) {
        return Vec::new();
    }
    vec![Vulnerability {
        url: response.url.clone(),
        title: format!("Server Error - {}", response.status_code),
        description: format!(
            "Server returned error code {} for {}. Error pages may leak sensitive information.",
            response.status_code, response.url
        ),
        severity: Severity::Low,
        recommendation: Some(
            "Configure custom error pages that don't reveal system details.".to_string(),
        ),
    }]
}

pub fn analyze_response(response: &ResponseSnapshot) -> Vec<Vulnerability> {
    let mut all = Vec::new();
    all.extend(check_security_headers(response));
    all.extend(check_insecure_transport(response));
    all.extend(check_interesting_files(response));
    all.extend(check_error_responses(response));
    all
}

/// Fetches each URL once and runs the passive checks on the response.
pub struct PassiveScanner {
    client: Client,
}

impl PassiveScanner {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(inspectron_scanner::http::DEFAULT_USER_AGENT)
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> reqwest::Result<ResponseSnapshot> {
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let content_type = headers.get("content-type").cloned();

        Ok(ResponseSnapshot {
            url: url.to_string(),
            status_code,
            content_type,
            headers,
        })
    }
}

impl Scanner for PassiveScanner {
    fn scan<'a>(
        &'a self,
        urls: &'a [String],
        log: &'a JobLogger,
    ) -> BoxFuture<'a, anyhow::Result<Vec<Vulnerability>>> {
        Box::pin(async move {
            let mut found = Vec::new();
            for (idx, url) in urls.iter().enumerate() {
                log.info(format!("Scanning {}/{}: {}", idx + 1, urls.len(), url));
                match self.fetch(url).await {
                    Ok(response) => {
                        let findings = analyze_response(&response);
                        debug!("{} findings for {}", findings.len(), url);
                        found.extend(findings);
                    }
                    Err(e) => log.warn(format!("Failed to scan {}: {}", url, e)),
                }
            }
            log.info(format!(
                "Scan completed. Found {} vulnerabilities.",
                found.len()
            ));
            Ok(found)
        })
    }
}
