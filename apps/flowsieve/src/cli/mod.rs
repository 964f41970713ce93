//! # flowsieve CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `discover` - Build the graph of a log file without the server
//! - `invalidate` - Drop the stored results of a log
//! - `status` - Show the durable cache

mod commands;

use clap::{Parser, Subcommand};
use flowsieve_core::FlowError;
use std::path::PathBuf;

pub use commands::*;

use crate::config::{Backend, ServerConfig};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// flowsieve - threshold-filterable process maps
///
/// Discovers directly-follows graphs of object-centric event logs and
/// serves them, with alignments and edge durations, over HTTP.
#[derive(Parser, Debug)]
#[command(name = "flowsieve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the durable cache database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Durable cache backend: "memory" or "redb"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

    /// Directory log files are resolved in
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Maximum number of jobs running at once
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Discover the graph of a log file
    Discover {
        /// Projected log file (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Write the graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drop the stored results of a log
    Invalidate {
        /// Log file name, relative to the data directory
        #[arg(long)]
        ocel: String,
    },

    /// Show durable cache status
    Status,
}

impl Cli {
    /// Configuration from file and environment, overridden by global flags.
    pub fn config(&self) -> Result<ServerConfig, FlowError> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), FlowError> {
    let mut config = cli.config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server {
            host,
            port,
            workers,
        }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate()?;
            cmd_server(&config).await
        }
        Some(Commands::Discover { file, output }) => {
            cmd_discover(&file, output.as_deref(), json_mode)
        }
        Some(Commands::Invalidate { ocel }) => cmd_invalidate(&config, &ocel, json_mode),
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::parse_from([
            "flowsieve",
            "--backend",
            "memory",
            "--data-dir",
            "logs",
            "status",
        ]);
        let config = cli.config().expect("config");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.data_dir, PathBuf::from("logs"));
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn discover_takes_file_and_output() {
        let cli = Cli::parse_from([
            "flowsieve", "-q", "discover", "-f", "log.json", "-o", "g.json",
        ]);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Some(Commands::Discover { ref file, output: Some(ref output) })
                if file == Path::new("log.json") && output == Path::new("g.json")
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["flowsieve", "--backend", "sqlite", "status"]).is_err());
    }
}
