//! Configuration of the view replicator.
//!
//! [`load_config`] merges the files under `configuration/` with `APP_`-prefixed environment
//! variables, and [`shared`] holds the typed settings they deserialize into.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config, load_config_from};
