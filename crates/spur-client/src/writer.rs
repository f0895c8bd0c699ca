//! Single-record appends.
//!
//! Each call is one round trip to the service. Nothing is batched or
//! pipelined, so write throughput is bounded by request latency.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::stream::{AppendAck, StreamHandle};
use crate::transport::RecordTransport;

/// Appends records to the stream a handle names.
#[derive(Clone)]
pub struct RecordWriter {
    transport: Arc<dyn RecordTransport>,
}

impl RecordWriter {
    pub fn new(transport: Arc<dyn RecordTransport>) -> Self {
        Self { transport }
    }

    /// Append `data` under the handle's partition key.
    pub async fn append(&self, handle: &StreamHandle, data: impl Into<Bytes>) -> Result<AppendAck> {
        let data = data.into();
        let size = data.len();

        let ack = self
            .transport
            .append(handle.name(), handle.partition_key(), data)
            .await
            .map_err(|e| ClientError::service("PutRecord", e))?;

        debug!(
            stream = %handle.name(),
            shard = %ack.shard_id,
            sequence = %ack.sequence_number,
            bytes = size,
            "Appended record"
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::transport::StreamDirectory;

    #[tokio::test]
    async fn test_append_uses_handle_partition_key() {
        let backend = Arc::new(MemoryBackend::new());
        backend.create_stream("logs", 1).await.unwrap();
        let writer = RecordWriter::new(backend.clone());
        let handle = StreamHandle::new("logs").with_partition_key("p1");

        let first = writer.append(&handle, "one").await.unwrap();
        let second = writer.append(&handle, "two").await.unwrap();

        assert_eq!(first.shard_id, second.shard_id);
        assert!(first.sequence_number < second.sequence_number);
        assert_eq!(backend.shard_len("logs", &first.shard_id), Some(2));
    }

    #[tokio::test]
    async fn test_append_to_missing_stream_is_service_error() {
        let writer = RecordWriter::new(Arc::new(MemoryBackend::new()));
        let err = writer
            .append(&StreamHandle::new("missing"), "data")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Service {
                operation: "PutRecord",
                ..
            }
        ));
        assert!(err.service_error().unwrap().is_not_found());
    }
}
