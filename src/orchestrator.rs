//! Multi-job orchestration.
//!
//! Jobs are declared as an explicit list of [`JobSpec`]s (name plus async
//! entry) and dispatched as independently scheduled tasks. The orchestrator
//! joins every unit before reporting; one job's failure never cancels its
//! siblings.

use crate::errors::AppResult;
use futures::future::join_all;
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info};

type JobFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;

/// One independently schedulable extraction job.
pub struct JobSpec {
    name: String,
    entry: Box<dyn FnOnce() -> JobFuture + Send>,
}

impl JobSpec {
    pub fn new<F, Fut>(name: impl Into<String>, entry: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            entry: Box::new(move || Box::pin(entry())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Terminal state of a job's execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failure,
}

/// One job's terminal outcome.
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Aggregate result of one orchestrated run.
#[derive(Debug)]
pub struct RunReport {
    pub jobs: Vec<JobOutcome>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.jobs.iter().all(JobOutcome::succeeded)
    }

    /// Process exit code: 0 only if every job succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}

/// Launches one execution unit per job spec, all starting concurrently, and
/// waits for every unit to reach a terminal state.
///
/// A job succeeds iff its entry returns `Ok`; an `Err` or a panicked task
/// counts as job failure. There is no early cancellation and no retry; the
/// orchestrator itself never crashes on a failed unit.
pub async fn run_jobs(specs: Vec<JobSpec>) -> RunReport {
    info!(jobs = specs.len(), "Starting extraction run");

    let mut names = Vec::with_capacity(specs.len());
    let mut handles = Vec::with_capacity(specs.len());

    for spec in specs {
        info!(job = spec.name.as_str(), "Launching job");
        names.push(spec.name);
        handles.push(tokio::spawn((spec.entry)()));
    }

    let results = join_all(handles).await;

    let mut jobs = Vec::with_capacity(names.len());
    for (name, result) in names.into_iter().zip(results) {
        let outcome = match result {
            Ok(Ok(())) => {
                info!(job = name.as_str(), "Job completed");
                JobOutcome {
                    name,
                    status: JobStatus::Success,
                    error: None,
                }
            }
            Ok(Err(e)) => {
                error!(job = name.as_str(), error = %e, "Job failed");
                JobOutcome {
                    name,
                    status: JobStatus::Failure,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                error!(job = name.as_str(), error = %e, "Job terminated abnormally");
                JobOutcome {
                    name,
                    status: JobStatus::Failure,
                    error: Some(format!("Execution unit terminated abnormally: {e}")),
                }
            }
        };
        jobs.push(outcome);
    }

    let report = RunReport { jobs };
    if report.all_succeeded() {
        info!("All extractions completed successfully");
    } else {
        error!(
            failed = report.jobs.iter().filter(|j| !j.succeeded()).count(),
            "Some extractions failed"
        );
    }
    report
}
