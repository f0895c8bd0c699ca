//! spur
//!
//! Command-line producer and consumer for shard-partitioned streams
//! (AWS Kinesis, or an in-process backend for trying things out).
//!
//! ## Overview
//!
//! `spur` provides an ergonomic interface to stream operations:
//! - **Stream management**: Create, list, describe and delete streams
//! - **Writing**: Append log lines, generated test records or stdin
//! - **Reading**: Backfill or tail one shard, with lag reporting
//! - **Interactive shell**: All of the above from a prompt
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a stream and wait for it to become ACTIVE
//! spur stream create app-logs --shards 2 --wait
//!
//! # Append log lines (timestamped)
//! spur --stream app-logs put "service started" "listening on :8080"
//! spur --stream app-logs put --iterations 100
//!
//! # Read everything, or follow new records
//! spur --stream app-logs read --all
//! spur --stream app-logs read --tail
//!
//! # Interactive shell
//! spur
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `~/.spur/config.toml` (see `spur config init`).
//! Flags override the file; some flags can also be set from the
//! environment:
//! - `SPUR_REGION`: AWS region
//! - `SPUR_ENDPOINT_URL`: Custom service endpoint
//! - `SPUR_STREAM`: Stream used by `put` and `read`
//!
//! Logging is controlled by `RUST_LOG`; `--verbose` turns on debug output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod format;
mod repl;
mod session;

use config::{Backend, Config, OutputFormat};
use format::Formatter;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "spur", version)]
#[command(about = "Produce and consume records on shard-partitioned streams", long_about = None)]
struct Cli {
    /// AWS region
    #[arg(long, env = "SPUR_REGION", global = true)]
    region: Option<String>,

    /// Custom service endpoint URL
    #[arg(long, env = "SPUR_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,

    /// Stream backend
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,

    /// Stream to write to or read from
    #[arg(short, long, env = "SPUR_STREAM", global = true)]
    stream: Option<String>,

    /// Partition key for appended records
    #[arg(long, global = true)]
    partition: Option<String>,

    /// Shard to read
    #[arg(long, global = true)]
    shard_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Describe what is going on as it happens
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.spur/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream management commands
    Stream {
        #[command(subcommand)]
        command: commands::StreamCommands,
    },
    /// Append log lines to a stream
    Put(commands::PutArgs),
    /// Read records from a stream's shard
    Read(commands::ReadArgs),
    /// Start the interactive shell (the default)
    Shell,
    /// Config file commands
    Config {
        #[command(subcommand)]
        command: commands::ConfigCommands,
    },
}

impl Cli {
    /// Layer command-line overrides on top of the file configuration.
    fn apply_to(&self, config: &mut Config) {
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(url) = &self.endpoint_url {
            config.endpoint_url = Some(url.clone());
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(stream) = &self.stream {
            config.stream = Some(stream.clone());
        }
        if let Some(partition) = &self.partition {
            config.partition_key = partition.clone();
        }
        if let Some(shard_id) = &self.shard_id {
            config.shard_id = shard_id.clone();
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if self.no_color {
            config.colored = false;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "spur=debug,spur_client=debug"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point for the CLI.
///
/// This function:
/// 1. Parses command-line arguments and loads the config file
/// 2. Connects to the selected backend
/// 3. Either enters the shell (no subcommand) or dispatches to a command handler
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load(Some(&config_path))?;
    cli.apply_to(&mut config);

    if !config.colored {
        colored::control::set_override(false);
    }
    let formatter = Formatter::new(config.output_format, config.colored);
    let session = Session::connect(config, formatter, cli.verbose).await;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Stream { command } => {
            commands::stream::handle_stream_command(&session, command).await?
        }
        Commands::Put(args) => {
            let stream = required_stream(&session.config)?;
            commands::put::handle_put(&session, &stream, args).await?
        }
        Commands::Read(args) => {
            let stream = required_stream(&session.config)?;
            commands::read::handle_read(&session, &stream, &args).await?
        }
        Commands::Shell => {
            let mut repl = repl::Repl::new(session)?;
            repl.run().await?;
        }
        Commands::Config { command } => {
            commands::config::handle_config_command(&session.config, &config_path, command)?
        }
    }

    Ok(())
}

fn required_stream(config: &Config) -> Result<String> {
    config
        .stream
        .clone()
        .context("No stream given. Pass --stream, set SPUR_STREAM, or set `stream` in the config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_config() {
        let cli = Cli::parse_from([
            "spur",
            "--region",
            "eu-central-1",
            "--backend",
            "memory",
            "--stream",
            "app-logs",
            "--partition",
            "p7",
            "--format",
            "json",
            "--no-color",
            "read",
        ]);
        let mut config = Config::default();
        cli.apply_to(&mut config);

        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.stream.as_deref(), Some("app-logs"));
        assert_eq!(config.partition_key, "p7");
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(!config.colored);
        assert_eq!(config.shard_id, spur_client::DEFAULT_SHARD_ID);
    }

    #[test]
    fn test_no_subcommand_means_shell() {
        let cli = Cli::parse_from(["spur"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["spur", "read", "--all", "--stream", "logs"]);
        assert_eq!(cli.stream.as_deref(), Some("logs"));
        match cli.command {
            Some(Commands::Read(args)) => assert!(args.all),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_required_stream_missing() {
        let err = required_stream(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No stream given"));
    }

    #[test]
    fn test_stream_create_defaults() {
        let cli = Cli::parse_from(["spur", "stream", "create", "orders"]);
        match cli.command {
            Some(Commands::Stream {
                command:
                    commands::StreamCommands::Create {
                        name,
                        shards,
                        wait,
                    },
            }) => {
                assert_eq!(name, "orders");
                assert_eq!(shards, commands::stream::DEFAULT_SHARD_COUNT);
                assert!(!wait);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
