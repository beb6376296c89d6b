use std::future::Future;

use crate::error::EtlResult;
use crate::types::{DatasetRef, TableRef};

/// Trait for warehouses that can enumerate tables and materialize views.
///
/// A single destination instance is shared by all job workers, so implementations must be safe
/// to call concurrently. [`ViewDestination::create_or_replace_view`] must be idempotent: calling
/// it for a view that already exists replaces the definition instead of failing.
pub trait ViewDestination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Lists the names of all tables in `dataset`.
    ///
    /// Implementations follow pagination until every table has been returned. A missing dataset
    /// is reported as an error rather than as an empty list.
    fn list_tables(
        &self,
        dataset: &DatasetRef,
    ) -> impl Future<Output = EtlResult<Vec<String>>> + Send;

    /// Creates the view `view` defined by `query`, replacing any existing definition.
    fn create_or_replace_view(
        &self,
        view: &TableRef,
        query: &str,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
