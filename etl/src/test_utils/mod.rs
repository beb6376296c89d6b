//! Utilities for testing view replication without a real warehouse.
//!
//! - [`destination`] wraps any [`crate::destination::ViewDestination`] to record calls, inject
//!   failures and delays per view, and measure how many views were materialized concurrently.

pub mod destination;
