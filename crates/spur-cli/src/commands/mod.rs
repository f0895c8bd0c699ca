//! Command handlers for spur
//!
//! This module contains handlers for different command categories:
//! - Stream: create, delete, list and describe streams
//! - Put: append log lines to a stream
//! - Read: backfill or tail one shard
//! - Config: inspect and initialise the config file

pub mod config;
pub mod put;
pub mod read;
pub mod stream;

// Re-export for convenience
pub use config::ConfigCommands;
pub use put::PutArgs;
pub use read::ReadArgs;
pub use stream::StreamCommands;
