use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::destination::ViewDestination;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{DatasetRef, TableRef};

#[derive(Debug, Default)]
struct Behavior {
    failing_views: HashSet<String>,
    delays: HashMap<String, Duration>,
}

#[derive(Debug, Default)]
struct Calls {
    list_tables: Vec<DatasetRef>,
    started_views: Vec<String>,
    finished_views: Vec<String>,
}

#[derive(Debug)]
struct Inner<D> {
    wrapped_destination: D,
    behavior: RwLock<Behavior>,
    calls: RwLock<Calls>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Test wrapper for [`ViewDestination`] implementations that tracks all operations.
///
/// Views can be configured to fail or to take a given amount of time before reaching the
/// wrapped destination. The wrapper also records the highest number of
/// [`ViewDestination::create_or_replace_view`] calls observed in flight at the same time.
#[derive(Debug)]
pub struct TestDestinationWrapper<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for TestDestinationWrapper<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D> TestDestinationWrapper<D> {
    /// Wraps `destination`.
    pub fn wrap(destination: D) -> Self {
        Self {
            inner: Arc::new(Inner {
                wrapped_destination: destination,
                behavior: RwLock::new(Behavior::default()),
                calls: RwLock::new(Calls::default()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the wrapped destination.
    pub fn wrapped(&self) -> &D {
        &self.inner.wrapped_destination
    }

    /// Makes every materialization of `view` fail with [`ErrorKind::DestinationQueryFailed`].
    pub async fn fail_view(&self, view: &TableRef) {
        let mut behavior = self.inner.behavior.write().await;
        behavior.failing_views.insert(view.to_string());
    }

    /// Delays every materialization of `view` by `delay` before it completes.
    pub async fn delay_view(&self, view: &TableRef, delay: Duration) {
        let mut behavior = self.inner.behavior.write().await;
        behavior.delays.insert(view.to_string(), delay);
    }

    /// Returns the datasets passed to [`ViewDestination::list_tables`], in call order.
    pub async fn list_tables_calls(&self) -> Vec<DatasetRef> {
        self.inner.calls.read().await.list_tables.clone()
    }

    /// Returns the views whose materialization started, in call order.
    pub async fn started_views(&self) -> Vec<String> {
        self.inner.calls.read().await.started_views.clone()
    }

    /// Returns the views whose materialization finished, successfully or not, in completion
    /// order.
    pub async fn finished_views(&self) -> Vec<String> {
        self.inner.calls.read().await.finished_views.clone()
    }

    /// Returns the highest number of concurrent view materializations observed.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

impl<D> ViewDestination for TestDestinationWrapper<D>
where
    D: ViewDestination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> EtlResult<Vec<String>> {
        {
            let mut calls = self.inner.calls.write().await;
            calls.list_tables.push(dataset.clone());
        }

        self.inner.wrapped_destination.list_tables(dataset).await
    }

    async fn create_or_replace_view(&self, view: &TableRef, query: &str) -> EtlResult<()> {
        let view_name = view.to_string();
        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(current, Ordering::SeqCst);

        {
            let mut calls = self.inner.calls.write().await;
            calls.started_views.push(view_name.clone());
        }

        let (fail, delay) = {
            let behavior = self.inner.behavior.read().await;
            (
                behavior.failing_views.contains(&view_name),
                behavior.delays.get(&view_name).copied(),
            )
        };

        if let Some(delay) = delay {
            sleep(delay).await;
        }

        let result = if fail {
            Err(etl_error!(
                ErrorKind::DestinationQueryFailed,
                "Injected view failure",
                view_name.clone()
            ))
        } else {
            self.inner
                .wrapped_destination
                .create_or_replace_view(view, query)
                .await
        };

        {
            let mut calls = self.inner.calls.write().await;
            calls.finished_views.push(view_name);
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }
}
