//! Orchestration of a full view replication run.
//!
//! A run lists the tables of the source dataset, turns every table into a [`ViewJob`], executes
//! all jobs on a [`JobPool`] and collapses the per-job outcomes into a single result.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::destination::ViewDestination;
use crate::error::EtlResult;
use crate::template::TemplateSource;
use crate::types::{DatasetRef, ViewJob};
use crate::workers::pool::{FailureReport, JobPool, JobReport};
use crate::workers::view::ViewJobRunner;

/// Callback invoked once for every view that was materialized successfully.
pub type ViewCreatedHook = Arc<dyn Fn(&ViewJob) + Send + Sync>;

/// Settings of a [`ViewPipeline`] that are independent of the destination.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Dataset whose tables are replicated.
    pub source_dataset: DatasetRef,
    /// Dataset in which the views are created.
    pub target_dataset: DatasetRef,
    /// Template used to generate the query of every view.
    pub template: TemplateSource,
    /// Maximum number of views materialized at the same time.
    pub max_concurrent_jobs: usize,
    /// How per-job failures are surfaced once all jobs are done.
    pub failure_report: FailureReport,
}

/// Replicates every table of a source dataset as a view in a target dataset.
pub struct ViewPipeline<D> {
    config: PipelineConfig,
    destination: Arc<D>,
    on_view_created: Option<ViewCreatedHook>,
}

impl<D> ViewPipeline<D>
where
    D: ViewDestination + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig, destination: D) -> Self {
        Self {
            config,
            destination: Arc::new(destination),
            on_view_created: None,
        }
    }

    /// Registers a callback invoked from the worker right after each view is materialized.
    pub fn with_view_created_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViewJob) + Send + Sync + 'static,
    {
        self.on_view_created = Some(Arc::new(hook));
        self
    }

    /// Builds one job per table of the source dataset, in listing order.
    ///
    /// Names are used as listed: no filtering, deduplication or validation happens here.
    pub async fn build_jobs(&self) -> EtlResult<Vec<ViewJob>> {
        let table_names = self
            .destination
            .list_tables(&self.config.source_dataset)
            .await?;

        let jobs = table_names
            .into_iter()
            .map(|table_name| {
                ViewJob::new(
                    table_name,
                    self.config.source_dataset.clone(),
                    self.config.target_dataset.clone(),
                )
            })
            .collect();

        Ok(jobs)
    }

    /// Runs all `jobs` and waits until every one of them has an outcome.
    ///
    /// Every failure is logged, including the ones that are not surfaced by the aggregated
    /// result.
    pub async fn run_jobs(&self, jobs: Vec<ViewJob>) -> JobReport {
        let runner = Arc::new(ViewJobRunner::new(
            self.destination.clone(),
            self.config.template.clone(),
        ));
        let on_view_created = self.on_view_created.clone();
        let table_names: Vec<String> = jobs.iter().map(|j| j.table_name().to_owned()).collect();

        if !jobs.is_empty() {
            info!(num_jobs = jobs.len(), "waiting for all tasks to complete");
        }

        let pool = JobPool::new(self.config.max_concurrent_jobs);
        let report = pool
            .run_all(jobs, move |job: ViewJob| {
                let runner = runner.clone();
                let on_view_created = on_view_created.clone();
                async move {
                    runner.run(&job).await?;
                    if let Some(hook) = on_view_created {
                        hook(&job);
                    }
                    Ok(())
                }
            })
            .await;

        for (index, err) in report.failures() {
            error!(table_name = %table_names[index], error = %err, "view job failed");
        }

        info!(
            num_jobs = report.len(),
            num_succeeded = report.num_succeeded(),
            "all view jobs finished"
        );

        report
    }

    /// Runs a full replication and returns the aggregated result.
    ///
    /// Failing to list the source dataset aborts the run before any job is submitted.
    pub async fn run(&self) -> EtlResult<()> {
        info!(
            source_dataset = %self.config.source_dataset,
            target_dataset = %self.config.target_dataset,
            destination = D::name(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "starting view replication"
        );

        let jobs = self.build_jobs().await?;
        let report = self.run_jobs(jobs).await;

        report.into_result(self.config.failure_report)
    }
}

impl<D> fmt::Debug for ViewPipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPipeline")
            .field("config", &self.config)
            .field("destination", &std::any::type_name::<D>())
            .finish()
    }
}
