//! spur client - shard reads, appends and stream lifecycle
//!
//! This crate holds the stateful pieces of `spur`: cursor tracking for one
//! shard, the polling consumer loop built on it, the asynchronous watcher
//! that follows a stream through `CREATING`/`DELETING`, and the registry of
//! known streams. Remote access goes through two traits,
//! [`RecordTransport`] and [`StreamDirectory`], implemented by
//! [`KinesisBackend`] and the in-process [`MemoryBackend`].
//!
//! # Examples
//!
//! ## Reading a shard
//!
//! ```ignore
//! use spur_client::{CursorManager, PollConfig, PollEvent, ShardPoller, ShutdownHandle};
//!
//! let poller = ShardPoller::new(CursorManager::new(backend.clone()), PollConfig::default());
//! let mut handle = StreamHandle::new("logs").with_start(StartPosition::TrimHorizon);
//! let shutdown = ShutdownHandle::new();
//!
//! poller.run(&mut handle, &shutdown, |event| {
//!     if let PollEvent::Record { record, .. } = event {
//!         println!("{}", String::from_utf8_lossy(&record.data));
//!     }
//! }).await?;
//! ```
//!
//! ## Waiting for a new stream
//!
//! ```ignore
//! registry.create("logs", 2).await?;
//! let outcome = watcher.watch("logs", StreamStatus::Creating).await?;
//! println!("{} is {}", outcome.stream, outcome.result?);
//! ```

pub mod cursor;
pub mod error;
pub mod kinesis;
pub mod memory;
pub mod poller;
pub mod registry;
pub mod shutdown;
pub mod stream;
pub mod transport;
pub mod watcher;
pub mod writer;

pub use cursor::CursorManager;
pub use error::{ClientError, Result, ServiceError, ServiceErrorKind};
pub use kinesis::KinesisBackend;
pub use memory::MemoryBackend;
pub use poller::{Lag, PollConfig, PollEvent, PollSummary, ShardPoller, StopReason};
pub use registry::{Deletion, HandleDefaults, RegistryEntry, StreamRegistry};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
pub use stream::{
    AppendAck, CursorState, FetchResult, Record, ShardInfo, ShardIterator, StartPosition,
    StreamDescription, StreamHandle, StreamPage, StreamStatus, DEFAULT_PARTITION_KEY,
    DEFAULT_SHARD_ID,
};
pub use transport::{RecordTransport, ServiceResult, StreamDirectory};
pub use watcher::{LifecycleWatcher, WatchConfig, WatchOutcome};
pub use writer::RecordWriter;
