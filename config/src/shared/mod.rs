//! Typed settings of the view replicator.

mod base;
mod bigquery;
mod replicator;
mod views;

pub use base::ValidationError;
pub use bigquery::{BigQueryConfig, BigQueryCredentials};
pub use replicator::ViewReplicatorConfig;
pub use views::{FailureReportConfig, ViewsConfig};
