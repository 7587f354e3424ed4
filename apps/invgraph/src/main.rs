//! # Invgraph - inventory store administration
//!
//! The command line binary over invgraph-core.
//!
//! ## Usage
//!
//! ```bash
//! invgraph init --admin-password secret
//! invgraph class create Router --parent InventoryObject
//! invgraph class children Router
//! invgraph object create Router --name core-1
//! invgraph audit general --limit 10
//! ```
//!
//! `INVGRAPH_LOG` sets the log filter, `INVGRAPH_LOG_FORMAT=json` switches
//! to machine-parseable output.

use clap::Parser;
use invgraph::cli;
use invgraph::config::AppConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = cli::execute(cli, config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let log_format = std::env::var("INVGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if verbose {
        "invgraph=debug,invgraph_core=debug"
    } else {
        "invgraph=info,invgraph_core=info"
    };
    let filter = EnvFilter::try_from_env("INVGRAPH_LOG").unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
