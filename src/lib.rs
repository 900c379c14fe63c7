pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the defaults;
/// `verbose` raises this crate to debug.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("substrate_replenishment=debug,warn")
        } else {
            EnvFilter::new(config::default_log_filter())
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
