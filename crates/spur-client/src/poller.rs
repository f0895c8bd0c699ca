//! Polling consumer loop for one shard.
//!
//! ## State machine
//!
//! ```text
//! START ──▶ FETCHING ──non-empty──▶ EMITTING ──▶ FETCHING
//!              │
//!              ├──empty, lag > 0 or tailing──▶ WAITING ──interval──▶ FETCHING
//!              │
//!              └──empty, lag == 0, not tailing──▶ DONE
//! ```
//!
//! - `START` resets the handle's cursor and acquires a fresh one. Failure
//!   ends the loop before anything is emitted.
//! - `FETCHING` asks the transport for the batch at the current cursor and
//!   replaces the cursor with the returned one. A transport failure ends the
//!   loop; nothing is retried.
//! - `WAITING` sleeps for [`PollConfig::wait_interval`].
//!
//! ## Events
//!
//! The caller sees progress through [`PollEvent`]s:
//! - every record once, in delivery order
//! - the lag, only when it differs from the last reported value
//! - the length of a run of empty fetches, once, when the run ends with a
//!   non-empty fetch
//! - `Done` when the loop stops cleanly
//!
//! Errors are not events; they are the `Err` returned by [`ShardPoller::run`].
//!
//! ## Lag trust
//!
//! "Caught up" is decided solely by the transport's lag metric. A backend
//! that reports 0 while records remain will end a non-tailing read early.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

use crate::cursor::CursorManager;
use crate::error::{ClientError, Result};
use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use crate::stream::{FetchResult, Record, StreamHandle};

/// Default sleep between fetches while caught up or tailing.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(500);

/// Settings for a polling read.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Keep waiting for new records instead of stopping when caught up.
    pub tail: bool,
    /// Sleep between fetches that returned nothing.
    pub wait_interval: Duration,
    /// Upper bound on records per fetch; backend default when `None`.
    pub limit: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tail: false,
            wait_interval: DEFAULT_WAIT_INTERVAL,
            limit: None,
        }
    }
}

impl PollConfig {
    pub fn tailing(mut self, tail: bool) -> Self {
        self.tail = tail;
        self
    }

    pub fn wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }
}

/// How far behind the newest record of the shard a read is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lag {
    CaughtUp,
    Behind(Duration),
}

impl Lag {
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Self::CaughtUp
        } else {
            Self::Behind(Duration::from_millis(millis))
        }
    }

    pub fn as_millis(&self) -> u64 {
        match self {
            Self::CaughtUp => 0,
            Self::Behind(d) => d.as_millis() as u64,
        }
    }
}

/// Why a read stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Empty fetch at lag 0 while not tailing.
    CaughtUp,
    /// The shutdown handle fired.
    Cancelled(ShutdownSignal),
}

/// Progress reported while polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A record, with its 0-based position in this read.
    Record { index: u64, record: Record },
    /// The lag changed since it was last reported.
    Lag(Lag),
    /// A run of `count` empty fetches just ended.
    EmptyReads { count: u64, lag: Lag },
    /// The loop stopped cleanly.
    Done(StopReason),
}

/// Totals for a finished read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub records: u64,
    pub fetches: u64,
    pub stop: StopReason,
}

#[derive(Debug, Clone, Copy)]
enum PollState {
    Start,
    Fetching,
    Emitting,
    Waiting,
    Done,
}

/// Lag de-duplication and empty-read accounting.
#[derive(Debug, Default)]
struct ReadTracker {
    last_lag: Option<u64>,
    empty_run: u64,
    records: u64,
    fetches: u64,
}

impl ReadTracker {
    /// Returns the lag when it should be reported.
    fn observe_lag(&mut self, millis: u64) -> Option<Lag> {
        if self.last_lag == Some(millis) {
            return None;
        }
        self.last_lag = Some(millis);
        Some(Lag::from_millis(millis))
    }

    fn observe_empty(&mut self) {
        self.empty_run += 1;
    }

    /// Ends the current run of empty fetches, returning its length if any.
    fn end_empty_run(&mut self) -> Option<u64> {
        match std::mem::take(&mut self.empty_run) {
            0 => None,
            count => Some(count),
        }
    }

    fn next_index(&mut self) -> u64 {
        let index = self.records;
        self.records += 1;
        index
    }

    fn summary(&self, stop: StopReason) -> PollSummary {
        PollSummary {
            records: self.records,
            fetches: self.fetches,
            stop,
        }
    }
}

/// Drives repeated fetches from one shard.
pub struct ShardPoller {
    cursors: CursorManager,
    config: PollConfig,
}

impl ShardPoller {
    pub fn new(cursors: CursorManager, config: PollConfig) -> Self {
        Self { cursors, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Read the handle's shard from its start position.
    ///
    /// Returns when caught up (not tailing), when `shutdown` fires, or with
    /// the first error. Every call starts over from the handle's start
    /// position.
    pub async fn run<F>(
        &self,
        handle: &mut StreamHandle,
        shutdown: &ShutdownHandle,
        mut emit: F,
    ) -> Result<PollSummary>
    where
        F: FnMut(PollEvent),
    {
        let mut tracker = ReadTracker::default();
        let mut state = PollState::Start;
        trace!(stream = %handle.name(), state = ?state, "Poll state");

        self.cursors.reset_cursor(handle);
        match until_cancelled(shutdown, self.cursors.ensure_cursor(handle)).await {
            Ok(acquired) => {
                acquired?;
            }
            Err(signal) => {
                return Ok(stop(&tracker, StopReason::Cancelled(signal), &mut emit));
            }
        }

        loop {
            state = PollState::Fetching;
            trace!(stream = %handle.name(), state = ?state, "Poll state");

            let cursor = self.cursors.ensure_cursor(handle).await?;
            let fetch = self.cursors.transport().fetch(&cursor, self.config.limit);
            let fetched = match until_cancelled(shutdown, fetch).await {
                Ok(result) => result.map_err(|source| ClientError::Fetch {
                    stream: handle.name().to_string(),
                    source,
                })?,
                Err(signal) => {
                    return Ok(stop(&tracker, StopReason::Cancelled(signal), &mut emit));
                }
            };
            tracker.fetches += 1;

            let FetchResult {
                records,
                lag_millis,
                next_cursor,
            } = fetched;
            self.cursors.advance(handle, next_cursor);

            if let Some(lag) = tracker.observe_lag(lag_millis) {
                emit(PollEvent::Lag(lag));
            }

            if !records.is_empty() {
                state = PollState::Emitting;
                debug!(
                    stream = %handle.name(),
                    state = ?state,
                    count = records.len(),
                    lag_ms = lag_millis,
                    "Fetched records"
                );

                if let Some(count) = tracker.end_empty_run() {
                    emit(PollEvent::EmptyReads {
                        count,
                        lag: Lag::from_millis(lag_millis),
                    });
                }
                for record in records {
                    let index = tracker.next_index();
                    emit(PollEvent::Record { index, record });
                }
                continue;
            }

            tracker.observe_empty();

            if lag_millis == 0 && !self.config.tail {
                state = PollState::Done;
                debug!(stream = %handle.name(), state = ?state, "Caught up");
                return Ok(stop(&tracker, StopReason::CaughtUp, &mut emit));
            }

            state = PollState::Waiting;
            trace!(
                stream = %handle.name(),
                state = ?state,
                lag_ms = lag_millis,
                empty_reads = tracker.empty_run,
                "Poll state"
            );
            let sleep = tokio::time::sleep(self.config.wait_interval);
            if let Err(signal) = until_cancelled(shutdown, sleep).await {
                return Ok(stop(&tracker, StopReason::Cancelled(signal), &mut emit));
            }
        }
    }
}

fn stop<F: FnMut(PollEvent)>(tracker: &ReadTracker, reason: StopReason, emit: &mut F) -> PollSummary {
    emit(PollEvent::Done(reason));
    tracker.summary(reason)
}

/// Runs `fut` unless cancellation wins the race.
async fn until_cancelled<F: Future>(
    shutdown: &ShutdownHandle,
    fut: F,
) -> std::result::Result<F::Output, ShutdownSignal> {
    tokio::select! {
        biased;
        signal = shutdown.cancelled() => Err(signal),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_reported_only_on_change() {
        let mut tracker = ReadTracker::default();
        assert_eq!(tracker.observe_lag(1500), Some(Lag::Behind(Duration::from_millis(1500))));
        assert_eq!(tracker.observe_lag(1500), None);
        assert_eq!(tracker.observe_lag(0), Some(Lag::CaughtUp));
        assert_eq!(tracker.observe_lag(0), None);
        assert_eq!(tracker.observe_lag(20), Some(Lag::Behind(Duration::from_millis(20))));
    }

    #[test]
    fn test_first_lag_always_reported() {
        let mut tracker = ReadTracker::default();
        assert_eq!(tracker.observe_lag(0), Some(Lag::CaughtUp));
    }

    #[test]
    fn test_empty_run_reported_once() {
        let mut tracker = ReadTracker::default();
        assert_eq!(tracker.end_empty_run(), None);

        tracker.observe_empty();
        tracker.observe_empty();
        tracker.observe_empty();
        assert_eq!(tracker.end_empty_run(), Some(3));
        assert_eq!(tracker.end_empty_run(), None);
    }

    #[test]
    fn test_lag_millis_roundtrip() {
        assert_eq!(Lag::from_millis(0), Lag::CaughtUp);
        assert_eq!(Lag::from_millis(250).as_millis(), 250);
        assert_eq!(Lag::CaughtUp.as_millis(), 0);
    }

    #[test]
    fn test_config_builders() {
        let config = PollConfig::default()
            .tailing(true)
            .wait_interval(Duration::from_secs(2))
            .limit(Some(25));
        assert!(config.tail);
        assert_eq!(config.wait_interval, Duration::from_secs(2));
        assert_eq!(config.limit, Some(25));
        assert_eq!(PollConfig::default().wait_interval, DEFAULT_WAIT_INTERVAL);
    }
}
