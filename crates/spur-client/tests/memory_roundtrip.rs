//! End-to-end reads and writes against the in-process backend.

use std::sync::Arc;
use spur_client::{
    CursorManager, MemoryBackend, PollConfig, PollEvent, RecordWriter, ShardPoller,
    ShutdownHandle, StartPosition, StopReason, StreamDirectory, StreamHandle,
};

async fn read_all(backend: Arc<MemoryBackend>, handle: &mut StreamHandle) -> Vec<(String, String)> {
    let poller = ShardPoller::new(CursorManager::new(backend), PollConfig::default());
    let mut records = Vec::new();
    let summary = poller
        .run(handle, &ShutdownHandle::new(), |event| {
            if let PollEvent::Record { record, .. } = event {
                records.push((
                    String::from_utf8_lossy(&record.data).into_owned(),
                    record.partition_key,
                ));
            }
        })
        .await
        .unwrap();
    assert_eq!(summary.stop, StopReason::CaughtUp);
    records
}

#[tokio::test]
async fn test_appended_record_read_back_unchanged() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_stream("logs", 1).await.unwrap();

    let handle = StreamHandle::new("logs").with_partition_key("p1");
    RecordWriter::new(backend.clone())
        .append(&handle, "hello")
        .await
        .unwrap();

    let mut reader = handle.with_start(StartPosition::TrimHorizon);
    let records = read_all(backend, &mut reader).await;

    assert_eq!(records, vec![("hello".to_string(), "p1".to_string())]);
}

#[tokio::test]
async fn test_latest_start_skips_existing_records() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_stream("logs", 1).await.unwrap();
    let writer = RecordWriter::new(backend.clone());
    let handle = StreamHandle::new("logs");
    writer.append(&handle, "old").await.unwrap();

    let mut reader = handle.clone().with_start(StartPosition::Latest);
    assert!(read_all(backend.clone(), &mut reader).await.is_empty());

    let mut backfill = handle.with_start(StartPosition::TrimHorizon);
    assert_eq!(read_all(backend, &mut backfill).await.len(), 1);
}

#[tokio::test]
async fn test_sequence_relative_starts() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_stream("logs", 1).await.unwrap();
    let writer = RecordWriter::new(backend.clone());
    let handle = StreamHandle::new("logs");

    let mut acks = Vec::new();
    for line in ["one", "two", "three"] {
        acks.push(writer.append(&handle, line).await.unwrap());
    }
    let second = acks[1].sequence_number.clone();

    let mut at = handle
        .clone()
        .with_start(StartPosition::AtSequenceNumber(second.clone()));
    let data: Vec<String> = read_all(backend.clone(), &mut at)
        .await
        .into_iter()
        .map(|(d, _)| d)
        .collect();
    assert_eq!(data, vec!["two", "three"]);

    let mut after = handle.with_start(StartPosition::AfterSequenceNumber(second));
    let data: Vec<String> = read_all(backend, &mut after)
        .await
        .into_iter()
        .map(|(d, _)| d)
        .collect();
    assert_eq!(data, vec!["three"]);
}

#[tokio::test]
async fn test_limit_splits_reads_into_batches() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_stream("logs", 1).await.unwrap();
    let writer = RecordWriter::new(backend.clone());
    let handle = StreamHandle::new("logs");
    for i in 0..5 {
        writer.append(&handle, format!("line {}", i)).await.unwrap();
    }

    let poller = ShardPoller::new(
        CursorManager::new(backend),
        PollConfig::default().limit(Some(2)),
    );
    let mut reader = handle.with_start(StartPosition::TrimHorizon);
    let summary = poller
        .run(&mut reader, &ShutdownHandle::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.records, 5);
    // Three non-empty batches, then the empty one at the tip.
    assert_eq!(summary.fetches, 4);
}
