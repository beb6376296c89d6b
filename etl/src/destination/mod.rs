//! Destinations that hold the replicated views.
//!
//! A destination lists the tables of a source dataset and creates or replaces views. The
//! [`ViewDestination`] trait is the seam between the job workers and the warehouse, so the same
//! pipeline runs against BigQuery or against the in-memory implementation.

mod base;
#[cfg(feature = "bigquery")]
pub mod bigquery;
pub mod memory;

pub use base::ViewDestination;
