use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::FailureReason;

/// Caller-supplied knobs for one archive run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Folder receiving `<normalized_host>.html` files.
    pub output_dir: PathBuf,
    /// Number of concurrent workers.
    pub pool_size: usize,
    /// Hard deadline for a single renderer invocation.
    pub timeout: Duration,
    /// Pause a worker takes after each job.
    pub inter_request_delay: Duration,
}

/// One URL to archive.
///
/// Created per input URL before the workers start and written exactly once by
/// the worker that dequeues it. `output_path` is filled in by that worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub url: String,
    pub output_path: Option<PathBuf>,
    pub succeeded: bool,
    pub failure: Option<FailureReason>,
}

impl ArchiveJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_path: None,
            succeeded: false,
            failure: None,
        }
    }

    /// Whether a terminal outcome has been recorded.
    pub fn is_finished(&self) -> bool {
        self.succeeded || self.failure.is_some()
    }

    pub fn mark_succeeded(&mut self) {
        debug_assert!(!self.is_finished(), "job outcome recorded twice");
        self.succeeded = true;
        self.failure = None;
    }

    pub fn mark_failed(&mut self, reason: FailureReason) {
        debug_assert!(!self.is_finished(), "job outcome recorded twice");
        self.succeeded = false;
        self.failure = Some(reason);
    }
}

/// A failed URL together with the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub url: String,
    pub reason: FailureReason,
}

/// Final statistics of an archive run. Built once, after every worker has
/// been joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_jobs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_bytes_downloaded: u64,
    pub failed_urls: Vec<String>,
    pub failures: Vec<JobFailure>,
    pub tool_available: bool,
    pub tool_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AggregateReport {
    /// Report for a run aborted by the renderer health check: nothing was
    /// processed.
    pub fn tool_unavailable(started_at: DateTime<Utc>, reason: String) -> Self {
        let now = Utc::now();
        Self {
            total_jobs: 0,
            success_count: 0,
            failure_count: 0,
            total_bytes_downloaded: 0,
            failed_urls: Vec::new(),
            failures: Vec::new(),
            tool_available: false,
            tool_error: Some(reason),
            started_at,
            finished_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }

    /// Aggregates finished jobs.
    ///
    /// Sizes are re-read from disk for every successful job. Two successful
    /// jobs sharing a host point at the same file, which is then counted once
    /// per job with whatever content the last writer left. If a later job on
    /// that host failed and removed the file, the success adds zero bytes.
    pub fn from_jobs(jobs: &[ArchiveJob], started_at: DateTime<Utc>) -> Self {
        let mut success_count = 0;
        let mut total_bytes_downloaded = 0;
        let mut failures = Vec::new();

        for job in jobs {
            if job.succeeded {
                success_count += 1;
                total_bytes_downloaded += job
                    .output_path
                    .as_ref()
                    .and_then(|path| std::fs::metadata(path).ok())
                    .map(|meta| meta.len())
                    .unwrap_or(0);
            } else {
                let reason = job.failure.clone().unwrap_or_else(|| {
                    FailureReason::WorkerFault("no worker left to process job".into())
                });
                failures.push(JobFailure {
                    url: job.url.clone(),
                    reason,
                });
            }
        }

        let now = Utc::now();
        Self {
            total_jobs: jobs.len(),
            success_count,
            failure_count: failures.len(),
            total_bytes_downloaded,
            failed_urls: failures.iter().map(|f| f.url.clone()).collect(),
            failures,
            tool_available: true,
            tool_error: None,
            started_at,
            finished_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}
