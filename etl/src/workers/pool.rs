use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;

/// How the failures of a [`JobReport`] are turned into a single result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureReport {
    /// Surface only the first failure in submission order.
    #[default]
    First,
    /// Surface every failure, in submission order, as one aggregated error.
    All,
}

/// Outcome of a single job.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success,
    Failure(EtlError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }
}

impl From<EtlResult<()>> for JobOutcome {
    fn from(result: EtlResult<()>) -> Self {
        match result {
            Ok(()) => JobOutcome::Success,
            Err(err) => JobOutcome::Failure(err),
        }
    }
}

/// Outcomes of all jobs run by [`JobPool::run_all`], indexed by submission order.
///
/// A report always holds exactly one outcome per submitted job.
#[derive(Debug, Clone)]
pub struct JobReport {
    outcomes: Vec<JobOutcome>,
}

impl JobReport {
    /// Returns the outcomes in submission order.
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the number of jobs that succeeded.
    pub fn num_succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Returns the failures together with the submission index of their job.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &EtlError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                JobOutcome::Success => None,
                JobOutcome::Failure(err) => Some((index, err)),
            })
    }

    /// Returns the first failure in submission order, regardless of completion order.
    pub fn first_failure(&self) -> Option<&EtlError> {
        self.failures().next().map(|(_, err)| err)
    }

    /// Collapses the report into a single result according to `failure_report`.
    pub fn into_result(self, failure_report: FailureReport) -> EtlResult<()> {
        let mut failures = self.outcomes.into_iter().filter_map(|outcome| match outcome {
            JobOutcome::Success => None,
            JobOutcome::Failure(err) => Some(err),
        });

        match failure_report {
            FailureReport::First => match failures.next() {
                Some(err) => Err(err),
                None => Ok(()),
            },
            FailureReport::All => {
                let errors: Vec<EtlError> = failures.collect();
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(errors.into())
                }
            }
        }
    }
}

/// Bounded pool that fans independent jobs out over concurrent workers.
///
/// Every job is submitted at once; a job starts only when one of the `max_concurrent_jobs`
/// permits is free and keeps it until its outcome is known. A failing job never cancels or
/// skips another one: [`JobPool::run_all`] returns only after every job has an outcome.
#[derive(Debug, Clone)]
pub struct JobPool {
    max_concurrent_jobs: usize,
}

impl JobPool {
    /// Default number of jobs that run at the same time.
    pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;

    /// Creates a pool running at most `max_concurrent_jobs` jobs at once.
    ///
    /// A limit of zero is raised to one so that queued jobs can always make progress.
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            max_concurrent_jobs: max_concurrent_jobs.max(1),
        }
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Runs `worker` on every job and waits for all of them to finish.
    ///
    /// Jobs may run and complete in any order, but the returned [`JobReport`] lists outcomes in
    /// the order of `jobs`. A worker that panics is recorded as a [`ErrorKind::JobPanic`] failure
    /// of its own job.
    pub async fn run_all<J, F, Fut>(&self, jobs: Vec<J>, worker: F) -> JobReport
    where
        J: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EtlResult<()>> + Send + 'static,
    {
        let num_jobs = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let worker = Arc::new(worker);
        let mut join_set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let worker = worker.clone();

            join_set.spawn(async move {
                // The semaphore is never closed, so acquiring can only fail if that changes.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        return (
                            index,
                            Err(etl_error!(
                                ErrorKind::InvalidState,
                                "Could not acquire a job permit",
                                err
                            )),
                        );
                    }
                };

                debug!(index, "job started");

                let result = match AssertUnwindSafe(worker(job)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(etl_error!(
                        ErrorKind::JobPanic,
                        "Job worker panicked",
                        panic_message(panic.as_ref())
                    )),
                };

                (index, result)
            });
        }

        let mut outcomes: Vec<Option<JobOutcome>> = vec![None; num_jobs];

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    debug!(index, succeeded = result.is_ok(), "job finished");
                    outcomes[index] = Some(result.into());
                }
                Err(join_err) => {
                    // Panics are caught inside the task, so this is only reachable if the
                    // runtime cancels it. The job is reported as failed below.
                    error!(error = %join_err, "job task did not complete");
                }
            }
        }

        let outcomes = outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    JobOutcome::Failure(etl_error!(
                        ErrorKind::JobPanic,
                        "Job task did not report an outcome"
                    ))
                })
            })
            .collect();

        JobReport { outcomes }
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CONCURRENT_JOBS)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
