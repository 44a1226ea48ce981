// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    CrawlOverrides, GlobalOptions, ReportFormat, extract_url_path, follow_job,
    generate_crawl_report, generate_scan_report, parse_seed, render_json, run_crawl, run_scan,
};
