//! JSON bodies for the job endpoints.
//!
//! These are the shapes a router returns for submit and status requests.
//! Status strings are exactly `pending`, `running`, `completed` and `failed`.

use crate::job::{Job, JobId, JobStatus};
use crate::scan::Vulnerability;
use inspectron_scanner::InteractableElement;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub elements: Vec<InteractableElement>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&Job> for SubmitResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

impl From<&Job> for CrawlStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            urls: job.urls.clone(),
            elements: job.elements.clone(),
            error: job.error.clone(),
        }
    }
}

impl From<&Job> for ScanStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            vulnerabilities: job.vulnerabilities.clone(),
            error: job.error.clone(),
        }
    }
}
