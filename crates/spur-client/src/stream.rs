//! Stream data model: handles, cursors, records and descriptions.
//!
//! A [`StreamHandle`] names one stream and one shard. Writers use its
//! partition key; readers use its shard id, start position and cursor. The
//! cursor is private to this crate: only the
//! [`CursorManager`](crate::cursor::CursorManager) moves it.

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Partition key used when none is configured.
pub const DEFAULT_PARTITION_KEY: &str = "PARTITION";

/// Shard read when none is configured.
pub const DEFAULT_SHARD_ID: &str = "shardId-000000000000";

/// Opaque read position within a shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardIterator(String);

impl ShardIterator {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the first cursor of a shard points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// The oldest untrimmed record.
    TrimHorizon,
    /// Just after the most recent record.
    #[default]
    Latest,
    /// At the record with this sequence number.
    AtSequenceNumber(String),
    /// Just after the record with this sequence number.
    AfterSequenceNumber(String),
}

impl StartPosition {
    /// Wire name of the iterator type.
    pub fn iterator_type(&self) -> &'static str {
        match self {
            Self::TrimHorizon => "TRIM_HORIZON",
            Self::Latest => "LATEST",
            Self::AtSequenceNumber(_) => "AT_SEQUENCE_NUMBER",
            Self::AfterSequenceNumber(_) => "AFTER_SEQUENCE_NUMBER",
        }
    }

    pub fn sequence_number(&self) -> Option<&str> {
        match self {
            Self::AtSequenceNumber(seq) | Self::AfterSequenceNumber(seq) => Some(seq),
            Self::TrimHorizon | Self::Latest => None,
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence_number() {
            Some(seq) => write!(f, "{}({})", self.iterator_type(), seq),
            None => f.write_str(self.iterator_type()),
        }
    }
}

impl FromStr for StartPosition {
    type Err = ClientError;

    /// Parses `TRIM_HORIZON`, `LATEST`, `AT_SEQUENCE_NUMBER:<n>` and
    /// `AFTER_SEQUENCE_NUMBER:<n>` (case-insensitive type names).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, seq) = match s.split_once(':') {
            Some((kind, seq)) => (kind, Some(seq.trim())),
            None => (s, None),
        };

        match (kind.trim().to_ascii_uppercase().as_str(), seq) {
            ("TRIM_HORIZON", None) => Ok(Self::TrimHorizon),
            ("LATEST", None) => Ok(Self::Latest),
            ("AT_SEQUENCE_NUMBER", Some(seq)) if !seq.is_empty() => {
                Ok(Self::AtSequenceNumber(seq.to_string()))
            }
            ("AFTER_SEQUENCE_NUMBER", Some(seq)) if !seq.is_empty() => {
                Ok(Self::AfterSequenceNumber(seq.to_string()))
            }
            _ => Err(ClientError::Config(format!(
                "invalid start position '{}'",
                s
            ))),
        }
    }
}

/// Read position of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorState {
    /// No cursor acquired since creation or the last reset.
    #[default]
    Unset,
    /// Positioned at this token.
    At(ShardIterator),
    /// The shard was closed and fully consumed.
    Exhausted,
}

/// One stream plus one shard, for reading and writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    name: String,
    partition_key: String,
    shard_id: String,
    start: StartPosition,
    pub(crate) cursor: CursorState,
}

impl StreamHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            start: StartPosition::default(),
            cursor: CursorState::Unset,
        }
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = key.into();
        self
    }

    pub fn with_shard_id(mut self, shard_id: impl Into<String>) -> Self {
        self.shard_id = shard_id.into();
        self
    }

    /// Changing the start position only affects the next acquired cursor.
    pub fn with_start(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn start(&self) -> &StartPosition {
        &self.start
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    /// Multi-line summary used by `describe` in the shell.
    pub fn description(&self) -> String {
        let cursor = match &self.cursor {
            CursorState::Unset => String::new(),
            CursorState::At(token) => token.to_string(),
            CursorState::Exhausted => "<exhausted>".to_string(),
        };
        format!(
            "Name: \"{}\"\nPartition: \"{}\"\nShardIteratorType: \"{}\"\nShardID: \"{}\"\nNextShardIterator: \"{}\"\n",
            self.name, self.partition_key, self.start, self.shard_id, cursor
        )
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - ({})", self.name, self.partition_key)
    }
}

/// A record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub data: Bytes,
    pub partition_key: String,
    /// Service-assigned, increasing within a shard.
    pub sequence_number: String,
}

/// One batch returned by a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub records: Vec<Record>,
    /// Milliseconds behind the newest record in the shard; 0 means caught up.
    pub lag_millis: u64,
    /// `None` once the shard is closed and fully read.
    pub next_cursor: Option<ShardIterator>,
}

/// Acknowledgement of an appended record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendAck {
    pub shard_id: String,
    pub sequence_number: String,
}

/// Remote lifecycle status of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    Creating,
    Deleting,
    Active,
    Updating,
    /// Synthesized once a deleted stream can no longer be described.
    Deleted,
    Other(String),
}

impl StreamStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "CREATING",
            Self::Deleting => "DELETING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleted => "DELETED",
            Self::Other(s) => s,
        }
    }

    /// Statuses expected to change on their own.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Deleting | Self::Updating)
    }
}

impl From<&str> for StreamStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATING" => Self::Creating,
            "DELETING" => Self::Deleting,
            "ACTIVE" => Self::Active,
            "UPDATING" => Self::Updating,
            "DELETED" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StreamStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardInfo {
    pub shard_id: String,
}

/// Last known remote description of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescription {
    pub name: String,
    pub status: StreamStatus,
    pub arn: String,
    pub shards: Vec<ShardInfo>,
}

/// One page of a stream listing.
#[derive(Debug, Clone, Default)]
pub struct StreamPage {
    pub names: Vec<String>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_defaults() {
        let handle = StreamHandle::new("TestStream");
        assert_eq!(handle.name(), "TestStream");
        assert_eq!(handle.partition_key(), DEFAULT_PARTITION_KEY);
        assert_eq!(handle.shard_id(), DEFAULT_SHARD_ID);
        assert_eq!(handle.start(), &StartPosition::Latest);
        assert_eq!(handle.cursor(), &CursorState::Unset);
        assert_eq!(handle.to_string(), "TestStream - (PARTITION)");
    }

    #[test]
    fn test_start_position_parse() {
        assert_eq!(
            "trim_horizon".parse::<StartPosition>().unwrap(),
            StartPosition::TrimHorizon
        );
        assert_eq!("LATEST".parse::<StartPosition>().unwrap(), StartPosition::Latest);
        assert_eq!(
            "AFTER_SEQUENCE_NUMBER:49590".parse::<StartPosition>().unwrap(),
            StartPosition::AfterSequenceNumber("49590".to_string())
        );
        assert!("AT_SEQUENCE_NUMBER".parse::<StartPosition>().is_err());
        assert!("SOMEWHERE".parse::<StartPosition>().is_err());
    }

    #[test]
    fn test_start_position_display() {
        assert_eq!(StartPosition::TrimHorizon.to_string(), "TRIM_HORIZON");
        assert_eq!(
            StartPosition::AtSequenceNumber("7".into()).to_string(),
            "AT_SEQUENCE_NUMBER(7)"
        );
    }

    #[test]
    fn test_status_roundtrip_and_transitional() {
        for raw in ["CREATING", "DELETING", "ACTIVE", "UPDATING", "DELETED"] {
            assert_eq!(StreamStatus::from(raw).as_str(), raw);
        }
        assert_eq!(
            StreamStatus::from("PAUSED"),
            StreamStatus::Other("PAUSED".to_string())
        );
        assert!(StreamStatus::Creating.is_transitional());
        assert!(!StreamStatus::Active.is_transitional());
    }

    #[test]
    fn test_description_mentions_cursor() {
        let mut handle = StreamHandle::new("s").with_start(StartPosition::TrimHorizon);
        handle.cursor = CursorState::At(ShardIterator::new("tok-1"));
        let text = handle.description();
        assert!(text.contains("ShardIteratorType: \"TRIM_HORIZON\""));
        assert!(text.contains("NextShardIterator: \"tok-1\""));
    }
}
