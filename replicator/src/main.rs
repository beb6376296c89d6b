//! View replicator binary.
//!
//! Replicates every table of a BigQuery dataset as a view in another dataset:
//!
//! ```text
//! view-replicator <SOURCE_PROJECT> <SOURCE_DATASET_SUFFIX> <TARGET_PROJECT> <TARGET_DATASET_SUFFIX>
//! ```
//!
//! Settings are read from `configuration/` in the working directory, see [`::config::load_config`].

use std::process::ExitCode;

use clap::Parser;
use ::config::shared::ViewReplicatorConfig;
use telemetry::tracing::init_tracing;
use tracing::error;

use crate::args::AppArgs;
use crate::config::load_replicator_config;
use crate::core::start_view_replicator;
use crate::error::{ReplicatorError, ReplicatorResult};

mod args;
mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        // Lets clap print usage and help with its own exit codes.
        Err(ReplicatorError::Argument(err)) => err.exit(),
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Parses arguments and loads the configuration before any replication work starts.
fn run() -> ReplicatorResult<()> {
    let args = AppArgs::try_parse()?;

    let replicator_config = load_replicator_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args, replicator_config))
}

async fn async_main(args: AppArgs, replicator_config: ViewReplicatorConfig) -> ReplicatorResult<()> {
    if let Err(err) = start_view_replicator(&args, &replicator_config).await {
        error!("{err}");

        return Err(err);
    }

    Ok(())
}
