use config::load_config;
use config::shared::ViewReplicatorConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the replicator configuration.
///
/// Uses the standard configuration loading mechanism from [`config`]. Running without a
/// `configuration/` directory yields the defaults, overridable through `APP_` variables.
pub fn load_replicator_config() -> ReplicatorResult<ViewReplicatorConfig> {
    let config = load_config::<ViewReplicatorConfig>().map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
