use std::path::PathBuf;

use config::shared::{BigQueryCredentials, FailureReportConfig, ViewReplicatorConfig};
use etl::destination::ViewDestination;
use etl::destination::bigquery::BigQueryClient;
use etl::pipeline::{PipelineConfig, ViewPipeline};
use etl::template::TemplateSource;
use etl::workers::pool::FailureReport;
use secrecy::ExposeSecret;
use tracing::info;

use crate::args::AppArgs;
use crate::error::ReplicatorResult;

/// Creates the BigQuery client and replicates the source dataset named by `args`.
pub async fn start_view_replicator(
    args: &AppArgs,
    replicator_config: &ViewReplicatorConfig,
) -> ReplicatorResult<()> {
    let pipeline_config = build_pipeline_config(args, replicator_config);
    let billing_project_id = replicator_config
        .bigquery
        .billing_project_id(&pipeline_config.target_dataset.project_id)
        .to_owned();

    let client = match replicator_config.bigquery.credentials() {
        BigQueryCredentials::KeyFile(path) => {
            info!(path, "authenticating with a service account key file");
            BigQueryClient::new_with_key_path(billing_project_id, path).await?
        }
        BigQueryCredentials::Key(key) => {
            info!("authenticating with an inline service account key");
            BigQueryClient::new_with_key(billing_project_id, key.expose_secret()).await?
        }
        BigQueryCredentials::ApplicationDefault => {
            info!("authenticating with application default credentials");
            BigQueryClient::new_with_adc(billing_project_id).await?
        }
    };

    replicate_views(pipeline_config, client).await
}

/// Runs one replication against `destination`, printing a confirmation per created view.
pub async fn replicate_views<D>(pipeline_config: PipelineConfig, destination: D) -> ReplicatorResult<()>
where
    D: ViewDestination + Send + Sync + 'static,
{
    let pipeline = ViewPipeline::new(pipeline_config, destination)
        .with_view_created_hook(|job| println!("Created view: {}", job.target_view()));

    pipeline.run().await?;

    info!("view replication done");

    Ok(())
}

fn build_pipeline_config(args: &AppArgs, replicator_config: &ViewReplicatorConfig) -> PipelineConfig {
    let views = &replicator_config.views;

    PipelineConfig {
        source_dataset: args.source_dataset(),
        target_dataset: args.target_dataset(),
        template: TemplateSource::File(PathBuf::from(&views.template_path)),
        max_concurrent_jobs: views.max_concurrent_jobs,
        failure_report: match views.failure_report {
            FailureReportConfig::First => FailureReport::First,
            FailureReportConfig::All => FailureReport::All,
        },
    }
}
