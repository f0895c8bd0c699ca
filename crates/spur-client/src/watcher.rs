//! Stream lifecycle watcher.
//!
//! Creating or deleting a stream returns long before the stream is usable
//! (or gone). A watch polls the stream's status in a background task until
//! it leaves the expected transitional status, then completes exactly once.
//!
//! ```text
//! spawn ─▶ sleep(initial_delay) ─▶ describe ──status == expected──▶ sleep(poll_interval) ─┐
//!                                     ▲                                                   │
//!                                     └───────────────────────────────────────────────────┘
//!                                     │
//!                                     ├── status != expected ─────────▶ complete(Ok(status))
//!                                     ├── not found, expected DELETING ▶ complete(Ok(DELETED))
//!                                     └── any other failure ──────────▶ complete(Err(..))
//! ```
//!
//! Completion is delivered through a `tokio::sync::oneshot` channel (see
//! [`LifecycleWatcher::watch`]) or a `FnOnce` callback (see
//! [`LifecycleWatcher::watch_with`]); both can only fire once.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::stream::StreamStatus;
use crate::transport::StreamDirectory;

/// Timing of a watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Wait before the first describe.
    pub initial_delay: Duration,
    /// Wait between describes.
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Final result of one watch.
#[derive(Debug)]
pub struct WatchOutcome {
    pub stream: String,
    /// The first status other than the expected one, or the failure.
    pub result: Result<StreamStatus>,
}

/// Spawns lifecycle watches against a directory.
#[derive(Clone)]
pub struct LifecycleWatcher {
    directory: Arc<dyn StreamDirectory>,
    config: WatchConfig,
}

impl LifecycleWatcher {
    pub fn new(directory: Arc<dyn StreamDirectory>, config: WatchConfig) -> Self {
        Self { directory, config }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Watch `stream` until it leaves `expected`; the receiver yields the
    /// outcome once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(
        &self,
        stream: impl Into<String>,
        expected: StreamStatus,
    ) -> oneshot::Receiver<WatchOutcome> {
        let (tx, rx) = oneshot::channel();
        self.watch_with(stream, expected, move |outcome| {
            // The receiver may have been dropped; nobody is listening then.
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Watch `stream` until it leaves `expected`, then call `on_complete`
    /// on the watch task.
    pub fn watch_with<F>(
        &self,
        stream: impl Into<String>,
        expected: StreamStatus,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let stream = stream.into();
        let directory = Arc::clone(&self.directory);
        let config = self.config.clone();

        tokio::spawn(async move {
            let result = poll_until_changed(directory.as_ref(), &stream, &expected, &config).await;
            debug!(
                stream = %stream,
                expected = %expected,
                result = ?result.as_ref().map(|s| s.as_str()),
                "Lifecycle watch finished"
            );
            on_complete(WatchOutcome { stream, result });
        })
    }
}

async fn poll_until_changed(
    directory: &dyn StreamDirectory,
    stream: &str,
    expected: &StreamStatus,
    config: &WatchConfig,
) -> Result<StreamStatus> {
    tokio::time::sleep(config.initial_delay).await;

    loop {
        match directory.describe_stream(stream).await {
            Ok(description) if description.status != *expected => {
                return Ok(description.status);
            }
            Ok(_) => {
                debug!(stream = %stream, status = %expected, "Still transitioning");
            }
            Err(e) if e.is_not_found() && *expected == StreamStatus::Deleting => {
                return Ok(StreamStatus::Deleted);
            }
            Err(source) => {
                return Err(ClientError::LifecycleWatch {
                    stream: stream.to_string(),
                    source,
                });
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}
