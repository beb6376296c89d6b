use std::fmt;
use std::sync::Once;

use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::table::ListOptions;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use gcp_bigquery_client::model::error_proto::ErrorProto;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::{Client, error::BQError, model::query_request::QueryRequest};
use tracing::{debug, info, warn};

use crate::destination::ViewDestination;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::{bail, etl_error};
use crate::types::{DatasetRef, TableRef};

/// Maximum number of tables requested per page when listing a dataset.
const LIST_TABLES_PAGE_SIZE: u64 = 1_000;

/// Server-side wait, in milliseconds, for each poll of a job that has not completed yet.
const QUERY_RESULTS_POLL_TIMEOUT_MS: i32 = 10_000;

/// Maximum number of polls of an incomplete job before giving up on it.
const MAX_QUERY_RESULTS_POLLS: u32 = 30;

/// BigQuery project identifier.
pub type BigQueryProjectId = String;

/// Ensures the crypto provider is only installed once.
static INIT_CRYPTO: Once = Once::new();

/// Installs the AWS LC crypto provider used by the TLS stack of the BigQuery client.
///
/// Safe to call many times; only the first call has an effect.
pub fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        // An error means another provider was installed first, which is fine for our use.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Converts BigQuery errors to ETL errors with appropriate classification.
fn bq_error_to_etl_error(err: BQError) -> EtlError {
    let (kind, description) = match &err {
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::InvalidApplicationDefaultCredentialsAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery application default credentials",
        ),
        BQError::AuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication error",
        ),
        BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery OAuth authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication token missing",
        ),
        BQError::RequestError(_) => (ErrorKind::DestinationIoError, "BigQuery request failed"),
        BQError::ResponseError { error } => match error.error.code {
            403 => (ErrorKind::PermissionDenied, "BigQuery permission denied"),
            404 => (
                ErrorKind::DestinationNamespaceMissing,
                "BigQuery entity not found",
            ),
            _ => (ErrorKind::DestinationQueryFailed, "BigQuery response error"),
        },
        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),
        _ => (ErrorKind::DestinationError, "BigQuery error"),
    };

    etl_error!(kind, description, err.to_string())
}

/// Completion state of a BigQuery query job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Done,
    Running,
}

/// Classifies a jobs API response by its `jobComplete` flag and reported errors.
///
/// Errors take precedence over completion, since a failed job can also be complete.
fn job_status(job_complete: Option<bool>, errors: Option<&[ErrorProto]>) -> EtlResult<JobStatus> {
    if let Some(errors) = errors
        && !errors.is_empty()
    {
        let messages = errors
            .iter()
            .map(|error| {
                error
                    .message
                    .clone()
                    .or_else(|| error.reason.clone())
                    .unwrap_or_else(|| "unknown error".to_owned())
            })
            .collect::<Vec<_>>()
            .join("; ");

        bail!(
            ErrorKind::DestinationQueryFailed,
            "BigQuery job reported errors",
            messages
        );
    }

    match job_complete {
        Some(true) => Ok(JobStatus::Done),
        _ => Ok(JobStatus::Running),
    }
}

/// Client for listing tables and materializing views in Google BigQuery.
///
/// Queries are billed to `project_id`, while the tables and views it operates on may live in
/// any project the credentials can access. The underlying client is cheap to clone and safe to
/// share across job workers.
#[derive(Clone)]
pub struct BigQueryClient {
    project_id: BigQueryProjectId,
    client: Client,
}

impl BigQueryClient {
    /// Creates a new [`BigQueryClient`] from a service account key file.
    pub async fn new_with_key_path(
        project_id: BigQueryProjectId,
        sa_key_file: &str,
    ) -> EtlResult<BigQueryClient> {
        install_crypto_provider();

        let client = ClientBuilder::new()
            .build_from_service_account_key_file(sa_key_file)
            .await
            .map_err(bq_error_to_etl_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Creates a new [`BigQueryClient`] from a service account key JSON string.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        sa_key: &str,
    ) -> EtlResult<BigQueryClient> {
        install_crypto_provider();

        let sa_key = parse_service_account_key(sa_key)
            .map_err(BQError::from)
            .map_err(bq_error_to_etl_error)?;
        let client = ClientBuilder::new()
            .build_from_service_account_key(sa_key, false)
            .await
            .map_err(bq_error_to_etl_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Creates a new [`BigQueryClient`] using Application Default Credentials.
    pub async fn new_with_adc(project_id: BigQueryProjectId) -> EtlResult<BigQueryClient> {
        install_crypto_provider();

        let client = ClientBuilder::new()
            .build_from_application_default_credentials()
            .await
            .map_err(bq_error_to_etl_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Returns the backtick-quoted, fully qualified name of `table`.
    pub fn full_table_name(table: &TableRef) -> EtlResult<String> {
        let project_id =
            Self::sanitize_identifier(&table.dataset.project_id, "BigQuery project id")?;
        let dataset_id =
            Self::sanitize_identifier(&table.dataset.dataset_id, "BigQuery dataset id")?;
        let table_id = Self::sanitize_identifier(&table.table_id, "BigQuery table id")?;

        Ok(format!("`{project_id}.{dataset_id}.{table_id}`"))
    }

    /// Builds the DDL statement that creates or replaces `view` with `query`.
    fn create_or_replace_view_query(view: &TableRef, query: &str) -> EtlResult<String> {
        let full_view_name = Self::full_table_name(view)?;

        Ok(format!("create or replace view {full_view_name} as {query}"))
    }

    /// Executes a BigQuery SQL statement through the jobs API and waits for the job to finish.
    ///
    /// A job still running when the initial call returns is polled with `getQueryResults` up to
    /// [`MAX_QUERY_RESULTS_POLLS`] times. Errors reported in any response fail the statement.
    async fn query(&self, request: QueryRequest) -> EtlResult<()> {
        let response = self
            .client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(bq_error_to_etl_error)?;

        if job_status(response.job_complete, response.errors.as_deref())? == JobStatus::Done {
            return Ok(());
        }

        let Some((job_id, location)) = response
            .job_reference
            .and_then(|reference| Some((reference.job_id?, reference.location)))
        else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "BigQuery job did not complete",
                "the response has no job reference to poll"
            );
        };

        for attempt in 1..=MAX_QUERY_RESULTS_POLLS {
            debug!(%job_id, attempt, "waiting for bigquery job to complete");

            let parameters = GetQueryResultsParameters {
                location: location.clone(),
                timeout_ms: Some(QUERY_RESULTS_POLL_TIMEOUT_MS),
                ..Default::default()
            };
            let results = self
                .client
                .job()
                .get_query_results(&self.project_id, &job_id, parameters)
                .await
                .map_err(bq_error_to_etl_error)?;

            if job_status(results.job_complete, results.errors.as_deref())? == JobStatus::Done {
                return Ok(());
            }
        }

        warn!(%job_id, "bigquery job still running after polling");

        bail!(
            ErrorKind::DestinationQueryFailed,
            "BigQuery job did not complete",
            format!("job {job_id} still running after {MAX_QUERY_RESULTS_POLLS} polls")
        );
    }

    /// Sanitizes a BigQuery identifier for safe backtick quoting.
    ///
    /// Rejects empty identifiers and identifiers containing control characters. Backticks and
    /// backslashes are escaped per GoogleSQL lexical rules.
    fn sanitize_identifier(identifier: &str, context: &str) -> EtlResult<String> {
        if identifier.is_empty() {
            bail!(
                ErrorKind::DestinationTableNameInvalid,
                "Invalid BigQuery identifier",
                format!("{context} cannot be empty")
            );
        }

        if identifier.chars().any(char::is_control) {
            bail!(
                ErrorKind::DestinationTableNameInvalid,
                "Invalid BigQuery identifier",
                format!("{context} contains control characters")
            );
        }

        let mut escaped = String::with_capacity(identifier.len());
        for ch in identifier.chars() {
            match ch {
                '`' => escaped.push_str("\\`"),
                '\\' => escaped.push_str("\\\\"),
                _ => escaped.push(ch),
            }
        }

        Ok(escaped)
    }
}

impl ViewDestination for BigQueryClient {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> EtlResult<Vec<String>> {
        let mut table_names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut options = ListOptions::default().max_results(LIST_TABLES_PAGE_SIZE);
            if let Some(token) = page_token.take() {
                options = options.page_token(token);
            }

            let page = self
                .client
                .table()
                .list(&dataset.project_id, &dataset.dataset_id, options)
                .await
                .map_err(bq_error_to_etl_error)?;

            let tables = page.tables.unwrap_or_default();
            debug!(%dataset, page_size = tables.len(), "listed a page of bigquery tables");

            table_names.extend(
                tables
                    .into_iter()
                    .map(|table| table.table_reference.table_id),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(%dataset, num_tables = table_names.len(), "listed bigquery tables");

        Ok(table_names)
    }

    async fn create_or_replace_view(&self, view: &TableRef, query: &str) -> EtlResult<()> {
        let statement = Self::create_or_replace_view_query(view, query)?;

        info!(%view, "creating or replacing view in bigquery");

        self.query(QueryRequest::new(statement)).await
    }
}

impl fmt::Debug for BigQueryClient {
    /// Formats the client for debugging, excluding sensitive client details.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .finish()
    }
}
