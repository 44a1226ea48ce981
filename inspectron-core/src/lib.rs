pub mod api;
pub mod config;
pub mod job;
pub mod logs;
pub mod orchestrator;
pub mod scan;

pub use config::{Config, ConfigError};
pub use job::{Job, JobError, JobId, JobKind, JobRegistry, JobStatus};
pub use logs::{JobLogger, LogChannel, LogHub, LogSubscription, StreamConfig, StreamEvent};
pub use orchestrator::{EngineFactory, JobOrchestrator, JobRequest, SubmitError};
pub use scan::{PassiveScanner, Scanner, Severity, Vulnerability};
