use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_max_concurrent_jobs() -> usize {
    ViewsConfig::DEFAULT_MAX_CONCURRENT_JOBS
}

fn default_template_path() -> String {
    ViewsConfig::DEFAULT_TEMPLATE_PATH.to_owned()
}

/// How failed view jobs are reported once a run is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReportConfig {
    /// Report the failure of the earliest submitted job.
    #[default]
    First,
    /// Report the failures of all jobs.
    All,
}

/// Settings of the view jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Query template file, relative to the working directory.
    #[serde(default = "default_template_path")]
    pub template_path: String,
    /// Maximum number of views created at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default)]
    pub failure_report: FailureReportConfig,
}

impl ViewsConfig {
    pub const DEFAULT_TEMPLATE_PATH: &'static str = "sec_view_template.sql";

    pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ValidationError::MaxConcurrentJobsZero);
        }

        if self.template_path.trim().is_empty() {
            return Err(ValidationError::TemplatePathEmpty);
        }

        Ok(())
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            failure_report: FailureReportConfig::default(),
        }
    }
}
