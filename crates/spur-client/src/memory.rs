//! In-process shard log.
//!
//! `MemoryBackend` implements both [`RecordTransport`] and
//! [`StreamDirectory`] without any network. It behaves like a small Kinesis:
//!
//! - streams have shards; records are routed to a shard by hashing the
//!   partition key and get an increasing sequence number
//! - cursors are single-use tokens; presenting one twice is an
//!   `ExpiredCursor` error, as is presenting one of the oldest when more
//!   than a thousand or so are outstanding
//! - listing is paginated (`page_size` names per page)
//! - a created stream reports `CREATING`, and a deleted one `DELETING`, for
//!   `transition_describes` describe calls before becoming `ACTIVE` or
//!   disappearing
//! - a shard can be closed; reading past the end of a closed shard yields no
//!   next cursor
//!
//! Used by the test suites and by `spur --backend memory`.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::trace;

use crate::error::{ServiceError, ServiceErrorKind};
use crate::stream::{
    AppendAck, FetchResult, Record, ShardInfo, ShardIterator, StartPosition, StreamDescription,
    StreamPage, StreamStatus,
};
use crate::transport::{RecordTransport, ServiceResult, StreamDirectory};

/// Records returned per fetch when no limit is given.
const DEFAULT_FETCH_LIMIT: usize = 10_000;

/// Largest shard count a stream may be created with.
pub const MAX_SHARD_COUNT: u32 = 500;

/// Unconsumed cursors kept before the oldest ones expire.
const MAX_LIVE_ITERATORS: usize = 1024;

struct StoredRecord {
    record: Record,
    appended_at: Instant,
}

struct MemoryShard {
    id: String,
    records: Vec<StoredRecord>,
    closed: bool,
}

struct MemoryStream {
    arn: String,
    status: StreamStatus,
    /// Describes left before a transitional status resolves.
    pending_describes: u32,
    shards: Vec<MemoryShard>,
}

#[derive(Clone)]
struct IteratorPosition {
    stream: String,
    shard: usize,
    position: usize,
}

#[derive(Default)]
struct MemoryState {
    streams: BTreeMap<String, MemoryStream>,
    /// Unconsumed cursors by issue number, oldest first.
    iterators: BTreeMap<u64, (String, IteratorPosition)>,
    next_sequence: u64,
    next_token: u64,
}

impl MemoryState {
    fn active_stream(&mut self, name: &str) -> ServiceResult<&mut MemoryStream> {
        let stream = self
            .streams
            .get_mut(name)
            .ok_or_else(|| stream_not_found(name))?;
        if stream.status != StreamStatus::Active {
            return Err(ServiceError::new(
                ServiceErrorKind::InUse,
                format!("Stream {} is {}, not ACTIVE", name, stream.status),
            ));
        }
        Ok(stream)
    }

    fn issue_token(&mut self, position: IteratorPosition) -> ShardIterator {
        self.next_token += 1;
        let token = format!(
            "{}/{}/{}/{}",
            position.stream, position.shard, position.position, self.next_token
        );
        self.iterators
            .insert(self.next_token, (token.clone(), position));
        while self.iterators.len() > MAX_LIVE_ITERATORS {
            self.iterators.pop_first();
        }
        ShardIterator::new(token)
    }

    /// Consume a cursor; each one is good for a single fetch.
    fn take_token(&mut self, cursor: &ShardIterator) -> ServiceResult<IteratorPosition> {
        let issued = cursor
            .as_str()
            .rsplit('/')
            .next()
            .and_then(|n| n.parse::<u64>().ok());
        match issued.and_then(|n| self.iterators.remove_entry(&n)) {
            Some((_, (token, position))) if token == cursor.as_str() => Ok(position),
            Some((n, entry)) => {
                self.iterators.insert(n, entry);
                Err(expired_cursor(cursor))
            }
            None => Err(expired_cursor(cursor)),
        }
    }
}

fn expired_cursor(cursor: &ShardIterator) -> ServiceError {
    ServiceError::new(
        ServiceErrorKind::ExpiredCursor,
        format!("Iterator {} is expired or unknown", cursor),
    )
}

fn stream_not_found(name: &str) -> ServiceError {
    ServiceError::not_found(format!("Stream {} not found", name))
}

fn parse_sequence(seq: &str) -> ServiceResult<u64> {
    seq.parse().map_err(|_| {
        ServiceError::new(
            ServiceErrorKind::InvalidArgument,
            format!("Invalid sequence number: {}", seq),
        )
    })
}

/// In-memory stream service.
pub struct MemoryBackend {
    region: String,
    page_size: usize,
    transition_describes: u32,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            region: "local".to_string(),
            page_size: 10,
            transition_describes: 0,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Names per listing page (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of describes that still report `CREATING`/`DELETING`.
    pub fn with_transition_describes(mut self, describes: u32) -> Self {
        self.transition_describes = describes;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close a shard: once its records are read, fetches return no next cursor.
    pub fn close_shard(&self, stream: &str, shard_id: &str) -> ServiceResult<()> {
        let mut state = self.state();
        let stream_state = state
            .streams
            .get_mut(stream)
            .ok_or_else(|| stream_not_found(stream))?;
        let shard = stream_state
            .shards
            .iter_mut()
            .find(|s| s.id == shard_id)
            .ok_or_else(|| ServiceError::not_found(format!("Shard {} not found", shard_id)))?;
        shard.closed = true;
        Ok(())
    }

    /// Number of records stored in one shard.
    pub fn shard_len(&self, stream: &str, shard_id: &str) -> Option<usize> {
        let state = self.state();
        state
            .streams
            .get(stream)?
            .shards
            .iter()
            .find(|s| s.id == shard_id)
            .map(|s| s.records.len())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn shard_name(index: usize) -> String {
    format!("shardId-{:012}", index)
}

#[async_trait]
impl RecordTransport for MemoryBackend {
    async fn initial_cursor(
        &self,
        stream: &str,
        shard_id: &str,
        start: &StartPosition,
    ) -> ServiceResult<ShardIterator> {
        let mut state = self.state();
        let stream_state = state.active_stream(stream)?;
        let (shard, records) = stream_state
            .shards
            .iter()
            .enumerate()
            .find(|(_, s)| s.id == shard_id)
            .map(|(i, s)| (i, &s.records))
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "Shard {} in stream {} does not exist",
                    shard_id, stream
                ))
            })?;

        let position = match start {
            StartPosition::TrimHorizon => 0,
            StartPosition::Latest => records.len(),
            StartPosition::AtSequenceNumber(seq) => {
                let seq = parse_sequence(seq)?;
                records
                    .iter()
                    .position(|r| parse_sequence(&r.record.sequence_number).unwrap_or(0) >= seq)
                    .unwrap_or(records.len())
            }
            StartPosition::AfterSequenceNumber(seq) => {
                let seq = parse_sequence(seq)?;
                records
                    .iter()
                    .position(|r| parse_sequence(&r.record.sequence_number).unwrap_or(0) > seq)
                    .unwrap_or(records.len())
            }
        };

        Ok(state.issue_token(IteratorPosition {
            stream: stream.to_string(),
            shard,
            position,
        }))
    }

    async fn fetch(
        &self,
        cursor: &ShardIterator,
        limit: Option<u32>,
    ) -> ServiceResult<FetchResult> {
        let mut state = self.state();
        let at = state.take_token(cursor)?;

        let limit = limit.map(|l| l as usize).unwrap_or(DEFAULT_FETCH_LIMIT).max(1);
        let stream = state
            .streams
            .get(&at.stream)
            .ok_or_else(|| stream_not_found(&at.stream))?;
        let shard = &stream.shards[at.shard];

        let end = (at.position + limit).min(shard.records.len());
        let records: Vec<Record> = shard.records[at.position..end]
            .iter()
            .map(|stored| stored.record.clone())
            .collect();

        let lag_millis = match (shard.records.get(end), shard.records.last()) {
            (Some(next_unread), Some(newest)) => {
                let behind = newest.appended_at.duration_since(next_unread.appended_at);
                (behind.as_millis() as u64).max(1)
            }
            _ => 0,
        };
        let exhausted = shard.closed && end == shard.records.len();

        trace!(
            stream = %at.stream,
            shard = %shard.id,
            from = at.position,
            count = records.len(),
            lag_ms = lag_millis,
            "Memory fetch"
        );

        let next_cursor = if exhausted {
            None
        } else {
            Some(state.issue_token(IteratorPosition {
                position: end,
                ..at
            }))
        };

        Ok(FetchResult {
            records,
            lag_millis,
            next_cursor,
        })
    }

    async fn append(
        &self,
        stream: &str,
        partition_key: &str,
        data: Bytes,
    ) -> ServiceResult<AppendAck> {
        if partition_key.is_empty() {
            return Err(ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                "Partition key must not be empty",
            ));
        }

        let mut state = self.state();
        state.next_sequence += 1;
        let sequence_number = format!("{:020}", state.next_sequence);

        let stream_state = state.active_stream(stream)?;
        let mut hasher = DefaultHasher::new();
        partition_key.hash(&mut hasher);
        let index = (hasher.finish() % stream_state.shards.len() as u64) as usize;
        let shard = &mut stream_state.shards[index];
        if shard.closed {
            return Err(ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                format!("Shard {} is closed", shard.id),
            ));
        }

        shard.records.push(StoredRecord {
            record: Record {
                data,
                partition_key: partition_key.to_string(),
                sequence_number: sequence_number.clone(),
            },
            appended_at: Instant::now(),
        });

        Ok(AppendAck {
            shard_id: shard.id.clone(),
            sequence_number,
        })
    }
}

#[async_trait]
impl StreamDirectory for MemoryBackend {
    async fn create_stream(&self, name: &str, shard_count: u32) -> ServiceResult<()> {
        if shard_count == 0 {
            return Err(ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                "Shard count must be at least 1",
            ));
        }
        if shard_count > MAX_SHARD_COUNT {
            return Err(ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                format!(
                    "Shard count {} exceeds the limit of {}",
                    shard_count, MAX_SHARD_COUNT
                ),
            ));
        }

        let mut state = self.state();
        if state.streams.contains_key(name) {
            return Err(ServiceError::new(
                ServiceErrorKind::InUse,
                format!("Stream {} already exists", name),
            ));
        }

        let status = if self.transition_describes == 0 {
            StreamStatus::Active
        } else {
            StreamStatus::Creating
        };
        state.streams.insert(
            name.to_string(),
            MemoryStream {
                arn: format!("arn:aws:kinesis:{}:000000000000:stream/{}", self.region, name),
                status,
                pending_describes: self.transition_describes,
                shards: (0..shard_count as usize)
                    .map(|i| MemoryShard {
                        id: shard_name(i),
                        records: Vec::new(),
                        closed: false,
                    })
                    .collect(),
            },
        );
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> ServiceResult<()> {
        let mut state = self.state();
        if self.transition_describes == 0 {
            state
                .streams
                .remove(name)
                .ok_or_else(|| stream_not_found(name))?;
        } else {
            let stream = state
                .streams
                .get_mut(name)
                .ok_or_else(|| stream_not_found(name))?;
            stream.status = StreamStatus::Deleting;
            stream.pending_describes = self.transition_describes;
        }
        state.iterators.retain(|_, (_, pos)| pos.stream != name);
        Ok(())
    }

    async fn list_streams(&self, exclusive_start: Option<&str>) -> ServiceResult<StreamPage> {
        let state = self.state();
        let mut names = state
            .streams
            .keys()
            .filter(|name| exclusive_start.map_or(true, |start| name.as_str() > start));

        let page: Vec<String> = names.by_ref().take(self.page_size).cloned().collect();
        let has_more = names.next().is_some();
        Ok(StreamPage {
            names: page,
            has_more,
        })
    }

    async fn describe_stream(&self, name: &str) -> ServiceResult<StreamDescription> {
        let mut state = self.state();
        let stream = state
            .streams
            .get_mut(name)
            .ok_or_else(|| stream_not_found(name))?;

        if stream.status.is_transitional() {
            if stream.pending_describes > 0 {
                stream.pending_describes -= 1;
            } else if stream.status == StreamStatus::Deleting {
                state.streams.remove(name);
                return Err(stream_not_found(name));
            } else {
                stream.status = StreamStatus::Active;
            }
        }

        Ok(StreamDescription {
            name: name.to_string(),
            status: stream.status.clone(),
            arn: stream.arn.clone(),
            shards: stream
                .shards
                .iter()
                .map(|s| ShardInfo {
                    shard_id: s.id.clone(),
                })
                .collect(),
        })
    }
}
