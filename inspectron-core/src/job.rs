use crate::scan::Vulnerability;
use chrono::{DateTime, Utc};
use inspectron_scanner::InteractableElement;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Crawl,
    Scan,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Crawl => "crawl",
            JobKind::Scan => "scan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Statuses only move forward; terminal states are absorbing.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub urls: Vec<String>,
    /// Elements labeled during a crawl with labeling enabled.
    pub elements: Vec<InteractableElement>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub error: Option<String>,
    /// Crawl job a scan was started from.
    pub source_job: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(id: JobId, kind: JobKind, source_job: Option<JobId>) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            urls: Vec::new(),
            elements: Vec::new(),
            vulnerabilities: Vec::new(),
            error: None,
            source_job,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// In-memory table of job records.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<JobId, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: JobKind, source_job: Option<JobId>) -> JobId {
        let mut id = JobId::new();
        while self.jobs.contains_key(&id) {
            id = JobId::new();
        }
        self.jobs.insert(id, Job::new(id, kind, source_job));
        id
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    pub fn set_status(&mut self, id: &JobId, next: JobStatus) -> Result<(), JobError> {
        let job = self.jobs.get_mut(id).ok_or(JobError::NotFound(*id))?;
        if !job.status.can_advance_to(next) {
            return Err(JobError::InvalidTransition {
                id: *id,
                from: job.status,
                to: next,
            });
        }
        job.status = next;
        if next.is_terminal() {
            job.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn complete_crawl(
        &mut self,
        id: &JobId,
        urls: Vec<String>,
        elements: Vec<InteractableElement>,
    ) -> Result<(), JobError> {
        self.set_status(id, JobStatus::Completed)?;
        if let Some(job) = self.jobs.get_mut(id) {
            job.urls = urls;
            job.elements = elements;
        }
        Ok(())
    }

    pub fn complete_scan(
        &mut self,
        id: &JobId,
        vulnerabilities: Vec<Vulnerability>,
    ) -> Result<(), JobError> {
        self.set_status(id, JobStatus::Completed)?;
        if let Some(job) = self.jobs.get_mut(id) {
            job.vulnerabilities = vulnerabilities;
        }
        Ok(())
    }

    pub fn fail(&mut self, id: &JobId, error: impl Into<String>) -> Result<(), JobError> {
        self.set_status(id, JobStatus::Failed)?;
        if let Some(job) = self.jobs.get_mut(id) {
            job.error = Some(error.into());
        }
        Ok(())
    }
}
