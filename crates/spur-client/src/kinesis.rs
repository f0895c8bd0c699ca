//! AWS Kinesis backend.
//!
//! Maps the two backend traits onto the Kinesis Data Streams API:
//!
//! | Trait call           | Kinesis operation  |
//! |----------------------|--------------------|
//! | `initial_cursor`     | `GetShardIterator` |
//! | `fetch`              | `GetRecords`       |
//! | `append`             | `PutRecord`        |
//! | `create_stream`      | `CreateStream`     |
//! | `delete_stream`      | `DeleteStream`     |
//! | `list_streams`       | `ListStreams`      |
//! | `describe_stream`    | `DescribeStream`   |
//!
//! Credentials come from the standard AWS provider chain. An endpoint URL
//! override points the client at a compatible local service.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::ShardIteratorType;
use aws_sdk_kinesis::Client;
use bytes::Bytes;
use tracing::debug;

use crate::error::{ServiceError, ServiceErrorKind};
use crate::stream::{
    AppendAck, FetchResult, Record, ShardInfo, ShardIterator, StartPosition, StreamDescription,
    StreamPage, StreamStatus,
};
use crate::transport::{RecordTransport, ServiceResult, StreamDirectory};

/// Kinesis Data Streams client.
#[derive(Clone)]
pub struct KinesisBackend {
    client: Client,
}

impl KinesisBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for `region`, optionally against a custom endpoint.
    pub async fn connect(region: impl Into<String>, endpoint_url: Option<String>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;

        let mut builder = aws_sdk_kinesis::config::Builder::from(&sdk_config);
        if let Some(url) = endpoint_url {
            debug!(endpoint = %url, "Using custom Kinesis endpoint");
            builder = builder.endpoint_url(url);
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

fn classify(code: Option<&str>) -> ServiceErrorKind {
    match code {
        Some("ResourceNotFoundException") => ServiceErrorKind::NotFound,
        Some("ProvisionedThroughputExceededException")
        | Some("LimitExceededException")
        | Some("KMSThrottlingException") => ServiceErrorKind::Throttled,
        Some("ResourceInUseException") => ServiceErrorKind::InUse,
        Some("ExpiredIteratorException") => ServiceErrorKind::ExpiredCursor,
        Some("InvalidArgumentException") | Some("ValidationException") => {
            ServiceErrorKind::InvalidArgument
        }
        _ => ServiceErrorKind::Other,
    }
}

fn service_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = classify(err.code());
    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        _ => DisplayErrorContext(&err).to_string(),
    };
    ServiceError::new(kind, message)
}

#[async_trait]
impl RecordTransport for KinesisBackend {
    async fn initial_cursor(
        &self,
        stream: &str,
        shard_id: &str,
        start: &StartPosition,
    ) -> ServiceResult<ShardIterator> {
        let output = self
            .client
            .get_shard_iterator()
            .stream_name(stream)
            .shard_id(shard_id)
            .shard_iterator_type(ShardIteratorType::from(start.iterator_type()))
            .set_starting_sequence_number(start.sequence_number().map(str::to_string))
            .send()
            .await
            .map_err(service_error)?;

        output
            .shard_iterator()
            .map(ShardIterator::new)
            .ok_or_else(|| ServiceError::other("GetShardIterator returned no iterator"))
    }

    async fn fetch(
        &self,
        cursor: &ShardIterator,
        limit: Option<u32>,
    ) -> ServiceResult<FetchResult> {
        let output = self
            .client
            .get_records()
            .shard_iterator(cursor.as_str())
            .set_limit(limit.map(|l| l.min(i32::MAX as u32) as i32))
            .send()
            .await
            .map_err(service_error)?;

        let records = output
            .records()
            .iter()
            .map(|record| Record {
                data: Bytes::copy_from_slice(record.data().as_ref()),
                partition_key: record.partition_key().to_string(),
                sequence_number: record.sequence_number().to_string(),
            })
            .collect();

        Ok(FetchResult {
            records,
            lag_millis: output.millis_behind_latest().unwrap_or(0).max(0) as u64,
            next_cursor: output.next_shard_iterator().map(ShardIterator::new),
        })
    }

    async fn append(
        &self,
        stream: &str,
        partition_key: &str,
        data: Bytes,
    ) -> ServiceResult<AppendAck> {
        let output = self
            .client
            .put_record()
            .stream_name(stream)
            .partition_key(partition_key)
            .data(Blob::new(data.to_vec()))
            .send()
            .await
            .map_err(service_error)?;

        Ok(AppendAck {
            shard_id: output.shard_id().to_string(),
            sequence_number: output.sequence_number().to_string(),
        })
    }
}

#[async_trait]
impl StreamDirectory for KinesisBackend {
    async fn create_stream(&self, name: &str, shard_count: u32) -> ServiceResult<()> {
        let shard_count = i32::try_from(shard_count).map_err(|_| {
            ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                format!("Shard count {} is too large", shard_count),
            )
        })?;

        self.client
            .create_stream()
            .stream_name(name)
            .shard_count(shard_count)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> ServiceResult<()> {
        self.client
            .delete_stream()
            .stream_name(name)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn list_streams(&self, exclusive_start: Option<&str>) -> ServiceResult<StreamPage> {
        let output = self
            .client
            .list_streams()
            .set_exclusive_start_stream_name(exclusive_start.map(str::to_string))
            .send()
            .await
            .map_err(service_error)?;

        Ok(StreamPage {
            names: output.stream_names().to_vec(),
            has_more: output.has_more_streams(),
        })
    }

    async fn describe_stream(&self, name: &str) -> ServiceResult<StreamDescription> {
        let output = self
            .client
            .describe_stream()
            .stream_name(name)
            .send()
            .await
            .map_err(service_error)?;

        let description: Option<aws_sdk_kinesis::types::StreamDescription> =
            output.stream_description.into();
        let description = description
            .ok_or_else(|| ServiceError::other("DescribeStream returned no description"))?;

        Ok(StreamDescription {
            name: description.stream_name().to_string(),
            status: StreamStatus::from(description.stream_status().as_str()),
            arn: description.stream_arn().to_string(),
            shards: description
                .shards()
                .iter()
                .map(|shard| ShardInfo {
                    shard_id: shard.shard_id().to_string(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_classified() {
        assert_eq!(
            classify(Some("ResourceNotFoundException")),
            ServiceErrorKind::NotFound
        );
        assert_eq!(
            classify(Some("ProvisionedThroughputExceededException")),
            ServiceErrorKind::Throttled
        );
        assert_eq!(
            classify(Some("ResourceInUseException")),
            ServiceErrorKind::InUse
        );
        assert_eq!(
            classify(Some("ExpiredIteratorException")),
            ServiceErrorKind::ExpiredCursor
        );
        assert_eq!(
            classify(Some("InvalidArgumentException")),
            ServiceErrorKind::InvalidArgument
        );
        assert_eq!(classify(Some("InternalFailure")), ServiceErrorKind::Other);
        assert_eq!(classify(None), ServiceErrorKind::Other);
    }

    #[test]
    fn test_iterator_types_match_wire_names() {
        for start in [
            StartPosition::TrimHorizon,
            StartPosition::Latest,
            StartPosition::AtSequenceNumber("1".into()),
            StartPosition::AfterSequenceNumber("1".into()),
        ] {
            let wire = ShardIteratorType::from(start.iterator_type());
            assert_eq!(wire.as_str(), start.iterator_type());
        }
    }
}
