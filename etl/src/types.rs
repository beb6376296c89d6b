//! Core value types shared by the pipeline, the workers and the destinations.

use std::fmt;

/// A fully qualified dataset location, rendered as `project.dataset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRef {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetRef {
    /// Creates a new [`DatasetRef`] from a project id and a dataset id.
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    /// Returns a reference to the table `table_id` inside this dataset.
    pub fn table(&self, table_id: impl Into<String>) -> TableRef {
        TableRef {
            dataset: self.clone(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project_id, self.dataset_id)
    }
}

/// A fully qualified table or view, rendered as `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub dataset: DatasetRef,
    pub table_id: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table_id)
    }
}

/// One unit of work: render the query of a single source table and materialize it as a view.
///
/// Jobs are built once per enumerated source table and never mutated. The table name is taken
/// verbatim from the enumeration, so duplicates or malformed names produce their own job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewJob {
    table_name: String,
    source_dataset: DatasetRef,
    target_dataset: DatasetRef,
}

impl ViewJob {
    /// Creates a job replicating `table_name` from `source_dataset` into `target_dataset`.
    pub fn new(
        table_name: impl Into<String>,
        source_dataset: DatasetRef,
        target_dataset: DatasetRef,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_dataset,
            target_dataset,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the source table the view reads from.
    pub fn source_table(&self) -> TableRef {
        self.source_dataset.table(&self.table_name)
    }

    /// Returns the view that is created or replaced by this job.
    pub fn target_view(&self) -> TableRef {
        self.target_dataset.table(&self.table_name)
    }
}

impl fmt::Display for ViewJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_table(), self.target_view())
    }
}
