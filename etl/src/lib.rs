//! Replicates the tables of a warehouse dataset as views in another dataset.
//!
//! Every table of the source dataset becomes a [`types::ViewJob`]. Jobs render a query template
//! bound to the fully qualified source table and materialize the result as a view through a
//! [`destination::ViewDestination`], with at most a fixed number of views in flight.

pub mod destination;
pub mod error;
mod macros;
pub mod pipeline;
pub mod template;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
