//! Backend seams.
//!
//! The core never talks to a service directly. Reads and writes go through
//! [`RecordTransport`]; stream lifecycle and discovery go through
//! [`StreamDirectory`]. Both return [`ServiceError`] so the core can wrap the
//! failure with the stage it happened in.
//!
//! Two implementations ship with the crate:
//! - [`KinesisBackend`](crate::kinesis::KinesisBackend) for AWS Kinesis (or a
//!   compatible endpoint)
//! - [`MemoryBackend`](crate::memory::MemoryBackend), an in-process shard log

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ServiceError;
use crate::stream::{
    AppendAck, FetchResult, ShardIterator, StartPosition, StreamDescription, StreamPage,
};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Appends and fetches records.
#[async_trait]
pub trait RecordTransport: Send + Sync {
    /// Obtain the first cursor of a shard.
    async fn initial_cursor(
        &self,
        stream: &str,
        shard_id: &str,
        start: &StartPosition,
    ) -> ServiceResult<ShardIterator>;

    /// Fetch the batch at `cursor`, at most `limit` records when set.
    async fn fetch(&self, cursor: &ShardIterator, limit: Option<u32>)
        -> ServiceResult<FetchResult>;

    /// Append a single record.
    async fn append(
        &self,
        stream: &str,
        partition_key: &str,
        data: Bytes,
    ) -> ServiceResult<AppendAck>;
}

/// Creates, deletes, lists and describes streams.
#[async_trait]
pub trait StreamDirectory: Send + Sync {
    async fn create_stream(&self, name: &str, shard_count: u32) -> ServiceResult<()>;

    async fn delete_stream(&self, name: &str) -> ServiceResult<()>;

    /// One page of stream names, starting after `exclusive_start` when set.
    async fn list_streams(&self, exclusive_start: Option<&str>) -> ServiceResult<StreamPage>;

    async fn describe_stream(&self, name: &str) -> ServiceResult<StreamDescription>;
}
