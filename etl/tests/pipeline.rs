#![cfg(feature = "test-utils")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::pipeline::{PipelineConfig, ViewPipeline};
use etl::template::{QueryTemplate, TemplateSource};
use etl::test_utils::destination::TestDestinationWrapper;
use etl::types::{DatasetRef, ViewJob};
use etl::workers::pool::{FailureReport, JobPool};
use telemetry::tracing::init_test_tracing;

fn source_dataset() -> DatasetRef {
    DatasetRef::new("analytics-prod", "raw_events")
}

fn target_dataset() -> DatasetRef {
    DatasetRef::new("analytics-secure", "events")
}

fn pipeline_config(template: TemplateSource, failure_report: FailureReport) -> PipelineConfig {
    PipelineConfig {
        source_dataset: source_dataset(),
        target_dataset: target_dataset(),
        template,
        max_concurrent_jobs: JobPool::DEFAULT_MAX_CONCURRENT_JOBS,
        failure_report,
    }
}

async fn wrapped_destination(tables: &[String]) -> TestDestinationWrapper<MemoryDestination> {
    let destination = MemoryDestination::new();
    destination
        .add_tables(&source_dataset(), tables.iter().cloned())
        .await;

    TestDestinationWrapper::wrap(destination)
}

#[tokio::test(flavor = "multi_thread")]
async fn views_are_created_for_every_table_from_a_template_file() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("sec_view_template.sql");
    std::fs::write(
        &template_path,
        "SELECT * EXCEPT (email)\nFROM `${source_table}`\nWHERE price > $$0",
    )
    .unwrap();

    let tables: Vec<String> = (0..25).map(|i| format!("events_{i:02}")).collect();
    let destination = wrapped_destination(&tables).await;
    for table in &tables {
        destination
            .delay_view(&target_dataset().table(table), Duration::from_millis(10))
            .await;
    }

    let created = Arc::new(Mutex::new(Vec::new()));
    let pipeline = ViewPipeline::new(
        pipeline_config(TemplateSource::File(template_path), FailureReport::First),
        destination.clone(),
    )
    .with_view_created_hook({
        let created = created.clone();
        move |job: &ViewJob| created.lock().unwrap().push(job.table_name().to_owned())
    });

    pipeline.run().await.unwrap();

    let mut created = created.lock().unwrap().clone();
    created.sort();
    assert_eq!(created, tables);

    let view = target_dataset().table("events_07");
    assert_eq!(
        destination.wrapped().view_query(&view).await.as_deref(),
        Some("SELECT * EXCEPT (email)\nFROM `analytics-prod.raw_events.events_07`\nWHERE price > $0")
    );
    assert!(destination.max_in_flight() > 1);
    assert!(destination.max_in_flight() <= JobPool::DEFAULT_MAX_CONCURRENT_JOBS);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_failure_in_submission_order_is_reported_after_all_jobs_finish() {
    init_test_tracing();

    let tables: Vec<String> = ["a", "b", "c", "d", "e"].map(String::from).to_vec();
    let destination = wrapped_destination(&tables).await;
    // "b" fails late, "d" fails immediately.
    destination.fail_view(&target_dataset().table("b")).await;
    destination
        .delay_view(&target_dataset().table("b"), Duration::from_millis(150))
        .await;
    destination.fail_view(&target_dataset().table("d")).await;
    destination
        .delay_view(&target_dataset().table("e"), Duration::from_millis(250))
        .await;

    let pipeline = ViewPipeline::new(
        pipeline_config(
            TemplateSource::Inline(QueryTemplate::new("SELECT * FROM ${source_table}")),
            FailureReport::First,
        ),
        destination.clone(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    assert_eq!(err.detail(), Some("analytics-secure.events.b"));
    assert_eq!(destination.finished_views().await.len(), tables.len());
    assert_eq!(destination.wrapped().views().await.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_failures_are_aggregated_in_submission_order() {
    init_test_tracing();

    let tables: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
    let destination = wrapped_destination(&tables).await;
    destination.fail_view(&target_dataset().table("a")).await;
    destination
        .delay_view(&target_dataset().table("a"), Duration::from_millis(100))
        .await;
    destination.fail_view(&target_dataset().table("c")).await;

    let pipeline = ViewPipeline::new(
        pipeline_config(
            TemplateSource::Inline(QueryTemplate::new("SELECT * FROM ${source_table}")),
            FailureReport::All,
        ),
        destination.clone(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(
        err.kinds(),
        vec![
            ErrorKind::DestinationQueryFailed,
            ErrorKind::DestinationQueryFailed
        ]
    );
    let details: Vec<_> = err
        .errors()
        .unwrap()
        .iter()
        .map(|err| err.detail().unwrap().to_owned())
        .collect();
    assert_eq!(
        details,
        vec!["analytics-secure.events.a", "analytics-secure.events.c"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_source_dataset_succeeds_without_jobs() {
    init_test_tracing();

    let destination = wrapped_destination(&[]).await;

    let pipeline = ViewPipeline::new(
        pipeline_config(
            TemplateSource::Inline(QueryTemplate::new("SELECT * FROM ${source_table}")),
            FailureReport::First,
        ),
        destination.clone(),
    );

    pipeline.run().await.unwrap();

    assert_eq!(destination.list_tables_calls().await, vec![source_dataset()]);
    assert!(destination.started_views().await.is_empty());
}
