use inspectron::handlers::*;
use inspectron_core::job::{JobKind, JobRegistry, JobStatus};
use inspectron_core::orchestrator::JobOrchestrator;
use inspectron_core::Config;
use inspectron_scanner::InteractableElement;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.to_string())
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body>
                <a href="/a">A</a>
                <a href="/a">A again</a>
                <a href="http://other.test/x">elsewhere</a>
                <a href="/a/">A slash</a>
            </body></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<html><body><a href="/">home</a></body></html>"#))
        .mount(server)
        .await;
}

#[test]
fn test_parse_seed_with_scheme() {
    assert_eq!(
        parse_seed("https://Example.com/docs/"),
        Ok("https://example.com/docs".to_string())
    );
}

#[test]
fn test_parse_seed_without_scheme() {
    assert_eq!(parse_seed("example.com"), Ok("http://example.com/".to_string()));
}

#[test]
fn test_parse_seed_invalid() {
    assert!(parse_seed("mailto:someone@example.com").is_err());
    assert!(parse_seed("   ").is_err());
}

#[test]
fn test_extract_url_path() {
    assert_eq!(extract_url_path("https://example.com/api/users"), "/api/users");
    assert_eq!(extract_url_path("https://example.com/"), "/");
    assert_eq!(extract_url_path("not a url"), "/");
}

#[test]
fn test_report_format_parse() {
    assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
    assert_eq!("text".parse::<ReportFormat>(), Ok(ReportFormat::Text));
    assert!("csv".parse::<ReportFormat>().is_err());
}

#[test]
fn test_overrides_win_over_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{ "crawl": {{ "max_pages": 100, "navigation_timeout_secs": 5 }} }}"#
    )?;

    let mut config = Config::load_or_default(Some(file.path()))?;
    let overrides = CrawlOverrides {
        max_pages: Some(3),
        timeout_secs: None,
        label_elements: true,
    };
    overrides.apply(&mut config);

    assert_eq!(config.crawl.max_pages, Some(3));
    assert_eq!(config.crawl.navigation_timeout_secs, 5);
    assert!(config.crawl.label_elements);

    Ok(())
}

#[test]
fn test_crawl_report_lists_labeled_elements() {
    let mut registry = JobRegistry::new();
    let id = registry.create(JobKind::Crawl, None);
    registry.set_status(&id, JobStatus::Running).unwrap();
    registry
        .complete_crawl(
            &id,
            vec!["http://site.test/".to_string()],
            vec![InteractableElement {
                element_id: "login".to_string(),
                tag_name: "button".to_string(),
                text_content: " Log in ".to_string(),
                label_number: 1,
                url: "http://site.test/".to_string(),
            }],
        )
        .unwrap();
    let job = registry.get(&id).unwrap();

    colored::control::set_override(false);
    let report = generate_crawl_report(job);
    assert!(report.contains("Interactable elements"));
    assert!(report.contains("  #1 <button> Log in on /\n"));

    let json: serde_json::Value = serde_json::from_str(&render_json(job).unwrap()).unwrap();
    assert_eq!(json["elements"][0]["tag_name"], "button");
}

#[tokio::test]
async fn test_run_crawl_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let orchestrator = JobOrchestrator::from_config(&Config::default()).unwrap();
    let seed = parse_seed(&server.uri()).unwrap();
    let job = run_crawl(&orchestrator, &seed, true).await.unwrap();

    assert_eq!(job.kind, JobKind::Crawl);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.urls, vec![seed.clone(), format!("{}/a", server.uri())]);

    colored::control::set_override(false);
    let report = generate_crawl_report(&job);
    assert!(report.contains("Pages visited: 2"));
    assert!(report.contains("  ✓ /a\n"));

    let json: serde_json::Value = serde_json::from_str(&render_json(&job).unwrap()).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["urls"].as_array().unwrap().len(), 2);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_run_scan_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let orchestrator = JobOrchestrator::from_config(&Config::default()).unwrap();
    let seed = parse_seed(&server.uri()).unwrap();
    let job = run_scan(&orchestrator, &seed, true).await.unwrap();

    assert_eq!(job.kind, JobKind::Scan);
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.source_job.is_some());
    // Both pages are HTML with no security headers set.
    assert_eq!(job.vulnerabilities.len(), 10);

    colored::control::set_override(false);
    let report = generate_scan_report(&job);
    assert!(report.contains("Vulnerabilities found: 10"));
    assert!(report.contains("[HIGH] Missing Strict-Transport-Security Header"));
}

#[tokio::test]
async fn test_run_crawl_reports_failure() {
    let orchestrator = JobOrchestrator::from_config(&Config::default()).unwrap();
    let err = run_crawl(&orchestrator, "ftp://example.com/", true)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("crawl job"));
    assert!(err.to_string().contains("Invalid URL"));
    assert!(!orchestrator.is_busy());
}
