use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::ViewDestination;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{DatasetRef, TableRef};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<DatasetRef, Vec<String>>,
    views: BTreeMap<String, String>,
}

/// In-memory destination for development and tests.
///
/// Source tables are registered up front with [`MemoryDestination::add_tables`]; views created
/// by the pipeline are kept keyed by their fully qualified name and can be inspected with
/// [`MemoryDestination::views`]. Everything is lost when the process terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty memory destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tables` in `dataset`, creating the dataset if needed.
    ///
    /// Tables are listed back in registration order.
    pub async fn add_tables<I, S>(&self, dataset: &DatasetRef, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .entry(dataset.clone())
            .or_default()
            .extend(tables.into_iter().map(Into::into));
    }

    /// Returns all views keyed by their fully qualified name.
    pub async fn views(&self) -> BTreeMap<String, String> {
        let inner = self.inner.lock().await;
        inner.views.clone()
    }

    /// Returns the query of a single view, if it exists.
    pub async fn view_query(&self, view: &TableRef) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.views.get(&view.to_string()).cloned()
    }
}

impl ViewDestination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> EtlResult<Vec<String>> {
        let inner = self.inner.lock().await;

        inner.tables.get(dataset).cloned().ok_or_else(|| {
            etl_error!(
                ErrorKind::DestinationNamespaceMissing,
                "Source dataset not found",
                dataset
            )
        })
    }

    async fn create_or_replace_view(&self, view: &TableRef, query: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;

        let replaced = inner
            .views
            .insert(view.to_string(), query.to_owned())
            .is_some();

        info!(view = %view, replaced, "created or replaced view in memory");

        Ok(())
    }
}
