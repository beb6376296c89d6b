//! Workers that execute view jobs.
//!
//! [`pool::JobPool`] fans jobs out over a bounded number of concurrent tasks and collects one
//! outcome per job, while [`view::ViewJobRunner`] is the unit of work run for each job.

pub mod pool;
pub mod view;
