// Tests for configuration loading

use inspectron_core::config::{Config, ConfigError};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.crawl.navigation_timeout(), Duration::from_secs(40));
    assert_eq!(config.crawl.max_pages, None);
    assert!(!config.crawl.label_elements);
    assert_eq!(config.crawl.user_agent, "Inspectron/0.1");

    let stream = config.logs.stream_config();
    assert_eq!(stream.poll_interval, Duration::from_millis(500));
    assert_eq!(stream.max_idle_polls, 60);
    assert_eq!(config.logs.history_capacity, 10_000);
    assert_eq!(config.scan.request_timeout(), Duration::from_secs(10));
}

#[test]
fn test_partial_file_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{ "crawl": {{ "max_pages": 25 }}, "logs": {{ "max_idle_polls": 5 }} }}"#
    )?;

    let config = Config::load(file.path())?;
    assert_eq!(config.crawl.max_pages, Some(25));
    assert_eq!(config.crawl.navigation_timeout_secs, 40);
    assert_eq!(config.logs.max_idle_polls, 5);
    assert_eq!(config.logs.poll_interval_ms, 500);
    assert_eq!(config.scan.request_timeout_secs, 10);

    Ok(())
}

#[test]
fn test_explicit_path_is_loaded() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, r#"{{ "crawl": {{ "label_elements": true }} }}"#)?;

    let config = Config::load_or_default(Some(file.path()))?;
    assert!(config.crawl.label_elements);

    Ok(())
}

#[test]
fn test_missing_explicit_path_is_io_error() {
    let result = Config::load_or_default(Some(Path::new("/nonexistent/inspectron.json")));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{ not json").unwrap();

    let result = Config::load(file.path());
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn test_default_path_is_expanded() {
    let path = Config::default_path();
    assert!(!path.to_string_lossy().starts_with('~'));
    assert!(path.ends_with(".config/inspectron/config.json"));
}
