// Multi-chunk submission

use std::time::{Duration, Instant};

use super::mock::{self, Reply};
use crate::codec::TransactionData;
use crate::error::Error;
use crate::operation_id::OperationId;
use crate::status::Status;
use crate::transaction::{FileAppendTransaction, TopicMessageSubmitTransaction};
use crate::types::{AccountId, FileId, TopicId};

fn message(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_chunks_are_submitted_in_order() {
    let transport = mock::MockTransport::new();
    for _ in 0..3 {
        transport.push(3, Reply::submit(Status::Ok));
    }
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let content = message(2500);
    let frozen = TopicMessageSubmitTransaction::default()
        .with_topic_id(TopicId::from_num(77))
        .with_message(content.clone())
        .with_chunk_size(1024)
        .freeze_with(&client)
        .unwrap();
    assert_eq!(frozen.chunks().len(), 3);

    let base = frozen.operation_id();
    let responses = frozen.execute_all(&client).await.unwrap();
    assert_eq!(responses.len(), 3);

    let mut reassembled = Vec::new();
    for (index, (call, response)) in transport.calls().iter().zip(&responses).enumerate() {
        let body = call.body();
        let expected = OperationId::derive_chunk(&base, index as u32);
        assert_eq!(body.operation_id, expected);
        assert_eq!(response.operation_id, expected);

        match body.data {
            TransactionData::TopicMessageSubmit {
                topic_id,
                message,
                chunk_info: Some(info),
            } => {
                assert_eq!(topic_id, TopicId::from_num(77));
                assert_eq!(info.initial_operation_id, base);
                assert_eq!(info.index, index as u32);
                assert_eq!(info.total, 3);
                reassembled.extend(message);
            }
            other => panic!("unexpected body data: {other:?}"),
        }
    }
    assert_eq!(reassembled, content);
}

#[tokio::test]
async fn test_transport_retries_keep_chunk_ids() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    transport.push(3, Reply::refused());
    transport.push(3, Reply::refused());
    transport.push(3, Reply::submit(Status::Ok));
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let frozen = TopicMessageSubmitTransaction::default()
        .with_topic_id(TopicId::from_num(5))
        .with_message(message(30))
        .with_chunk_size(10)
        .freeze_with(&client)
        .unwrap();
    let base = frozen.operation_id();
    let responses = frozen.execute_all(&client).await.unwrap();

    let ids: Vec<_> = responses.iter().map(|r| r.operation_id).collect();
    let expected: Vec<_> = (0..3).map(|i| OperationId::derive_chunk(&base, i)).collect();
    assert_eq!(ids, expected);

    // Chunk 2 went out three times, always under the same id
    let sent: Vec<_> = transport.calls().iter().map(|c| c.body().operation_id).collect();
    assert_eq!(
        sent,
        vec![expected[0], expected[1], expected[1], expected[1], expected[2]]
    );
}

#[tokio::test]
async fn test_request_timeout_spans_all_chunks() {
    let transport = mock::MockTransport::new();
    for _ in 0..3 {
        transport.push(3, Reply::Hang);
        transport.push(3, Reply::submit(Status::Ok));
    }
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let frozen = FileAppendTransaction::default()
        .with_file_id(FileId::from_num(150))
        .with_contents(message(30))
        .with_chunk_size(10)
        .with_attempt_timeout(Duration::from_millis(200))
        .with_request_timeout(Duration::from_millis(300))
        .freeze_with(&client)
        .unwrap();

    let started = Instant::now();
    let err = frozen.execute_all(&client).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(500));

    // Chunk 1 fits in the window, chunk 2 runs into its end
    match err {
        Error::DeadlineExceeded {
            operation_id,
            timeout,
            ..
        } => {
            assert_eq!(
                operation_id,
                Some(OperationId::derive_chunk(&frozen.operation_id(), 1))
            );
            assert_eq!(timeout, Duration::from_millis(300));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test]
async fn test_execute_returns_last_chunk() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let frozen = FileAppendTransaction::default()
        .with_file_id(FileId::from_num(150))
        .with_contents(message(20))
        .with_chunk_size(10)
        .freeze_with(&client)
        .unwrap();
    let response = frozen.execute(&client).await.unwrap();
    assert_eq!(
        response.operation_id,
        OperationId::derive_chunk(&frozen.operation_id(), 1)
    );
}

#[tokio::test]
async fn test_failed_chunk_stops_the_submission() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    transport.push(3, Reply::submit(Status::InvalidChunkNumber));
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let err = TopicMessageSubmitTransaction::default()
        .with_topic_id(TopicId::from_num(1))
        .with_message(message(30))
        .with_chunk_size(10)
        .execute(&client)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(Status::InvalidChunkNumber));
    assert_eq!(transport.calls().len(), 2);
    // Chunk 3 was never sent
    assert_eq!(transport.remaining(3), 1);
}

#[tokio::test]
async fn test_too_many_chunks_is_local() {
    let transport = mock::MockTransport::new();
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let err = TopicMessageSubmitTransaction::default()
        .with_topic_id(TopicId::from_num(1))
        .with_message(message(100))
        .with_chunk_size(10)
        .with_max_chunks(5)
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(transport.calls().is_empty());
}

#[test]
fn test_every_chunk_is_frozen_for_every_node() {
    let transport = mock::MockTransport::new();
    let (client, _) = mock::client(mock::config(&[3, 4, 5]), &transport);

    let frozen = TopicMessageSubmitTransaction::default()
        .with_topic_id(TopicId::from_num(1))
        .with_message(message(25))
        .with_chunk_size(10)
        .freeze_with(&client)
        .unwrap();

    assert_eq!(frozen.chunks().len(), 3);
    assert_eq!(frozen.payloads().count(), 9);
    for chunk in frozen.chunks() {
        for node in [3, 4, 5] {
            let payload = chunk.payload(&AccountId::from_num(node)).unwrap();
            assert_eq!(payload.operation_id(), chunk.operation_id());
            assert_eq!(payload.node_account_id(), AccountId::from_num(node));
        }
    }
}
