//! Stream management commands
//!
//! Create and delete return as soon as the service accepts the request;
//! `--wait` follows the stream until it leaves `CREATING`/`DELETING`.

use anyhow::{Context, Result};
use clap::Subcommand;
use spur_client::{RegistryEntry, StreamStatus};

use crate::format::StreamRow;
use crate::session::Session;

/// Shards given to a new stream when none is requested.
pub const DEFAULT_SHARD_COUNT: u32 = 2;

#[derive(Subcommand, Debug)]
pub enum StreamCommands {
    /// Create a new stream
    Create {
        /// Stream name
        name: String,
        /// Number of shards
        #[arg(long, default_value_t = DEFAULT_SHARD_COUNT)]
        shards: u32,
        /// Wait until the stream is ACTIVE
        #[arg(short, long)]
        wait: bool,
    },
    /// Delete a stream
    Delete {
        /// Stream name
        name: String,
        /// Wait until the stream is gone
        #[arg(short, long)]
        wait: bool,
    },
    /// List all streams in the region
    List,
    /// Describe one stream
    Describe {
        /// Stream name
        name: String,
    },
}

/// Handle stream commands
pub async fn handle_stream_command(session: &Session, command: StreamCommands) -> Result<()> {
    match command {
        StreamCommands::Create { name, shards, wait } => {
            create(session, &name, shards).await?;
            if wait {
                wait_for(session, &name, StreamStatus::Creating).await?;
            }
        }
        StreamCommands::Delete { name, wait } => {
            // Deletion goes through the registry, which only knows listed streams.
            session
                .registry
                .list()
                .await
                .context("Failed to list streams")?;
            delete(session, &name).await?;
            if wait {
                wait_for(session, &name, StreamStatus::Deleting).await?;
            }
        }
        StreamCommands::List => list(session).await?,
        StreamCommands::Describe { name } => describe(session, &name).await?,
    }

    Ok(())
}

pub async fn create(session: &Session, name: &str, shards: u32) -> Result<RegistryEntry> {
    let entry = session
        .registry
        .create(name, shards)
        .await
        .with_context(|| format!("Failed to create stream {}", name))?;

    session
        .formatter
        .print_success(&format!("Created stream: {} with {} shards.", name, shards));
    Ok(entry)
}

pub async fn delete(session: &Session, name: &str) -> Result<()> {
    let deletion = session.registry.delete(name).await?;
    deletion
        .remote
        .with_context(|| format!("Failed to delete stream {}", name))?;

    session
        .formatter
        .print_success(&format!("Deleted stream: {}.", name));
    Ok(())
}

pub async fn list(session: &Session) -> Result<()> {
    let entries = session
        .registry
        .list()
        .await
        .context("Failed to list streams")?;

    let rows = entries
        .iter()
        .map(|entry| match &entry.description {
            Some(description) => StreamRow::from(description),
            None => StreamRow::pending(entry.name()),
        })
        .collect();
    session.formatter.print_list::<StreamRow>(rows)?;

    if session.verbose {
        session.formatter.print_info(&session.registry.to_string());
    }
    Ok(())
}

pub async fn describe(session: &Session, name: &str) -> Result<()> {
    let description = session
        .registry
        .describe(name)
        .await
        .with_context(|| format!("Failed to describe stream {}", name))?;

    session.formatter.print_single(StreamRow::from(&description))
}

/// Block until `name` leaves `expected`, then record the new status.
pub async fn wait_for(session: &Session, name: &str, expected: StreamStatus) -> Result<StreamStatus> {
    session
        .formatter
        .print_info(&format!("Waiting for {} to leave {}...", name, expected));

    let outcome = session
        .watcher
        .watch(name, expected)
        .await
        .context("Lifecycle watch ended without a result")?;
    let status = outcome
        .result
        .with_context(|| format!("Failed waiting for stream {}", name))?;

    session.registry.record_status(name, status.clone());
    session
        .formatter
        .print_success(&format!("Stream {} is {}.", name, status));
    Ok(status)
}
