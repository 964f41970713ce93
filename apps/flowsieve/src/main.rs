//! # flowsieve - Process Map Server
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  apps/flowsieve (THE BINARY)                 │
//! │                                                              │
//! │  ┌──────────┐   ┌────────────┐   ┌────────────────────────┐  │
//! │  │   CLI    │   │  HTTP API  │   │  Worker pool (tokio)   │  │
//! │  │  (clap)  │   │  (axum)    │   │  jobs: dfg, alignments │  │
//! │  └────┬─────┘   └─────┬──────┘   └───────────┬────────────┘  │
//! │       └───────────────┼──────────────────────┘               │
//! │                       ▼                                      │
//! │              ┌─────────────────┐                             │
//! │              │ flowsieve-core  │                             │
//! │              │  (THE LOGIC)    │                             │
//! │              └─────────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! flowsieve server --host 0.0.0.0 --port 8080 --data-dir logs
//! flowsieve discover -f logs/p2p.json -o p2p-graph.json
//! flowsieve invalidate --ocel p2p.json
//! flowsieve status --json-mode
//! ```

use clap::Parser;
use flowsieve::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // FLOWSIEVE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("FLOWSIEVE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "flowsieve=debug,flowsieve_core=debug,tower_http=debug"
    } else {
        "flowsieve=info,flowsieve_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    eprintln!(
        r#"
   __ _                   _
  / _| | _____      _____(_) _____   _____
 | |_| |/ _ \ \ /\ / / __| |/ _ \ \ / / _ \
 |  _| | (_) \ V  V /\__ \ |  __/\ V /  __/
 |_| |_|\___/ \_/\_/ |___/_|\___| \_/ \___|

  process maps at every threshold v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
