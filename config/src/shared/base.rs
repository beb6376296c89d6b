use thiserror::Error;

/// Errors returned when a loaded configuration is not usable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// At most zero views could be created at the same time.
    #[error("`max_concurrent_jobs` cannot be zero")]
    MaxConcurrentJobsZero,
    /// No template file was configured.
    #[error("`template_path` cannot be empty")]
    TemplatePathEmpty,
    /// Both a key file and an inline key were configured.
    #[error(
        "Invalid BigQuery config: set at most one of `service_account_key_file` and `service_account_key`"
    )]
    ConflictingCredentials,
}
