//! Main entry point for a Warden node.
//!
//! Loads configuration, installs logging, then runs a lock contention soak
//! across simulated nodes sharing one cluster backend and prints the summary.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use warden_cache::ClusterBackend;
use warden_server::model::{Cli, Configuration};
use warden_server::{soak, startup};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::load(&cli)?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    warden_lock::describe_metrics();

    let lock_config = configuration.lock_config();
    let cache_config = configuration.cache_config();
    info!(
        lock_map = %lock_config.lock_map,
        request_map = %lock_config.request_map,
        max_attempts = lock_config.wait.max_attempts,
        wait_budget_ms = lock_config.wait.total_budget().as_millis() as u64,
        cache_ttl = ?cache_config.time_to_live,
        "Configuration loaded"
    );

    let backend = Arc::new(ClusterBackend::with_config(cache_config));
    let report = soak::run(backend, &lock_config, &configuration.soak_config())?;
    print!("{report}");

    Ok(())
}
