//! Backend wiring shared by one-shot commands and the shell.

use spur_client::{
    CursorManager, HandleDefaults, KinesisBackend, LifecycleWatcher, MemoryBackend,
    PollConfig, RecordTransport, RecordWriter, ShardPoller, StartPosition, StreamDirectory,
    StreamHandle, StreamRegistry, WatchConfig,
};
use std::sync::Arc;
use tracing::debug;

use crate::config::{Backend, Config};
use crate::format::Formatter;

/// Everything a command needs to talk to the stream service.
pub struct Session {
    pub config: Config,
    pub formatter: Formatter,
    pub verbose: bool,
    pub registry: Arc<StreamRegistry>,
    pub watcher: LifecycleWatcher,
    pub writer: RecordWriter,
    transport: Arc<dyn RecordTransport>,
}

impl Session {
    pub async fn connect(config: Config, formatter: Formatter, verbose: bool) -> Self {
        let (transport, directory): (Arc<dyn RecordTransport>, Arc<dyn StreamDirectory>) =
            match config.backend {
                Backend::Kinesis => {
                    let backend = Arc::new(
                        KinesisBackend::connect(config.region.clone(), config.endpoint_url.clone())
                            .await,
                    );
                    (
                        backend.clone() as Arc<dyn RecordTransport>,
                        backend as Arc<dyn StreamDirectory>,
                    )
                }
                Backend::Memory => {
                    // One describe in CREATING/DELETING so watches have something to report.
                    let backend = Arc::new(
                        MemoryBackend::new()
                            .with_region(config.region.clone())
                            .with_transition_describes(1),
                    );
                    (
                        backend.clone() as Arc<dyn RecordTransport>,
                        backend as Arc<dyn StreamDirectory>,
                    )
                }
            };
        debug!(backend = ?config.backend, region = %config.region, "Connected");

        let registry = Arc::new(
            StreamRegistry::new(directory.clone(), config.region.clone())
                .with_defaults(handle_defaults(&config)),
        );
        let watcher = LifecycleWatcher::new(
            directory,
            WatchConfig {
                initial_delay: config.watch_delay(),
                poll_interval: config.watch_interval(),
            },
        );

        Self {
            formatter,
            verbose,
            registry,
            watcher,
            writer: RecordWriter::new(transport.clone()),
            transport,
            config,
        }
    }

    /// A poller for one read.
    pub fn poller(&self, tail: bool, limit: Option<u32>) -> ShardPoller {
        ShardPoller::new(
            CursorManager::new(self.transport.clone()),
            PollConfig::default()
                .tailing(tail)
                .wait_interval(self.config.poll_interval())
                .limit(limit),
        )
    }

    /// A handle for `name` using the configured partition key and shard.
    pub fn handle(&self, name: &str) -> StreamHandle {
        StreamHandle::new(name)
            .with_partition_key(self.config.partition_key.clone())
            .with_shard_id(self.config.shard_id.clone())
    }
}

fn handle_defaults(config: &Config) -> HandleDefaults {
    HandleDefaults {
        partition_key: config.partition_key.clone(),
        shard_id: config.shard_id.clone(),
        start: StartPosition::Latest,
    }
}
