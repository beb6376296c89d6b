use std::sync::Arc;

use tracing::{debug, info};

use crate::destination::ViewDestination;
use crate::error::EtlResult;
use crate::template::{TemplateSource, source_table_parameters};
use crate::types::ViewJob;

/// Runs a single [`ViewJob`]: renders the view query and materializes it.
///
/// The runner is shared by all workers of a pool. Rendering happens before any call to the
/// destination, so a template failure never reaches the warehouse.
#[derive(Debug)]
pub struct ViewJobRunner<D> {
    destination: Arc<D>,
    template: TemplateSource,
}

impl<D> ViewJobRunner<D>
where
    D: ViewDestination,
{
    pub fn new(destination: Arc<D>, template: TemplateSource) -> Self {
        Self {
            destination,
            template,
        }
    }

    /// Renders the query for `job` without materializing it.
    pub async fn render(&self, job: &ViewJob) -> EtlResult<String> {
        let template = self.template.resolve().await?;
        let parameters = source_table_parameters(&job.source_table());

        template.render(&parameters)
    }

    /// Renders and materializes the view of `job`.
    pub async fn run(&self, job: &ViewJob) -> EtlResult<()> {
        let query = self.render(job).await?;
        let target_view = job.target_view();

        debug!(table_name = job.table_name(), %target_view, "rendered view query");

        self.destination
            .create_or_replace_view(&target_view, &query)
            .await?;

        info!(table_name = job.table_name(), %target_view, "created view");

        Ok(())
    }
}
