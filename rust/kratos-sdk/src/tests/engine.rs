// Execution engine scenarios

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::mock::{self, Reply, OPERATOR};
use crate::crypto::{CallbackKey, PrivateKey};
use crate::error::{Error, TransportError};
use crate::status::Status;
use crate::transaction::TransferTransaction;
use crate::transport::Method;
use crate::types::AccountId;

fn transfer() -> TransferTransaction {
    TransferTransaction::default().add_send(
        AccountId::from_num(OPERATOR),
        AccountId::from_num(2002),
        10,
    )
}

fn health(client: &crate::Client, node: u64) -> i32 {
    client
        .network()
        .get(&AccountId::from_num(node))
        .map(|n| n.health())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_transport_failure_moves_to_next_node() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::refused());
    transport.push(4, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3, 4, 5]), &transport);

    let response = transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .execute(&client)
        .await
        .unwrap();

    assert_eq!(response.node_account_id, AccountId::from_num(4));
    assert_eq!(transport.contacted(), vec![3, 4]);
    assert!(transport.calls().iter().all(|c| c.method == Method::SubmitTransaction));

    // The failing node is penalized, the accepting one is not
    let snapshot = client.network();
    let node3 = snapshot.get(&AccountId::from_num(3)).unwrap();
    assert!(node3.health() < 100);
    assert!(node3.remaining_backoff() > Duration::ZERO);
    assert_eq!(health(&client, 4), 100);
}

#[tokio::test]
async fn test_every_attempt_shares_the_operation_id() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::refused());
    transport.push(4, Reply::submit(Status::Busy));
    transport.push(5, Reply::submit(Status::Ok));
    let (client, key) = mock::client(mock::config(&[3, 4, 5]), &transport);

    let frozen = transfer()
        .with_node_account_ids(mock::ids(&[3, 4, 5]))
        .freeze_with(&client)
        .unwrap();
    let response = frozen.execute(&client).await.unwrap();
    assert_eq!(response.operation_id, frozen.operation_id());

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    for (call, node) in calls.iter().zip([3, 4, 5]) {
        let body = call.body();
        assert_eq!(body.operation_id, frozen.operation_id());
        // Each node gets the body frozen for it
        assert_eq!(body.node_account_id, AccountId::from_num(node));

        let envelope = call.envelope();
        assert_eq!(envelope.signatures.len(), 1);
        assert_eq!(envelope.signatures[0].public_key, key.public_key());
        assert!(envelope.signatures[0].verify(&envelope.body_bytes));
    }
}

#[tokio::test]
async fn test_retryable_rejection_wraps_back_to_the_same_node() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Busy));
    transport.push(3, Reply::submit(Status::PlatformNotActive));
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let response = transfer().execute(&client).await.unwrap();
    assert_eq!(response.node_account_id, AccountId::from_num(3));
    assert_eq!(transport.contacted(), vec![3, 3, 3]);
    // The final acceptance restores the node
    assert_eq!(health(&client, 3), 100);
}

#[tokio::test]
async fn test_node_level_rejection_penalizes_node() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Busy));
    transport.push(4, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(transport.contacted(), vec![3, 4]);
    assert!(health(&client, 3) < 100);
}

#[tokio::test]
async fn test_terminal_rejection_surfaces_immediately() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::InsufficientTxFee));
    transport.push(4, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    let frozen = transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .freeze_with(&client)
        .unwrap();
    let err = frozen.execute(&client).await.unwrap_err();

    match err {
        Error::NodeRejected {
            status,
            retryable,
            node,
            operation_id,
        } => {
            assert_eq!(status, Status::InsufficientTxFee);
            assert!(!retryable);
            assert_eq!(node, AccountId::from_num(3));
            assert_eq!(operation_id, Some(frozen.operation_id()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.contacted(), vec![3]);
    // Request-level rejections leave the node alone
    assert_eq!(health(&client, 3), 100);
}

#[tokio::test]
async fn test_expired_is_terminal() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::TransactionExpired));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let err = transfer().execute(&client).await.unwrap_err();
    assert_eq!(err.status(), Some(Status::TransactionExpired));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn test_attempt_budget_is_shared_across_nodes() {
    let transport = mock::MockTransport::new();
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    // Nothing scripted: every attempt is refused
    let err = transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .with_max_attempts(3)
        .execute(&client)
        .await
        .unwrap_err();

    assert_eq!(transport.contacted(), vec![3, 4, 3]);
    match err {
        Error::Transport { node, source, .. } => {
            assert_eq!(node, AccountId::from_num(3));
            assert!(matches!(source, TransportError::Connection(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_retryable_rejections_exhaust_the_budget() {
    let transport = mock::MockTransport::new();
    for _ in 0..4 {
        transport.push(3, Reply::submit(Status::Busy));
        transport.push(4, Reply::submit(Status::Busy));
    }
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    let err = transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .with_max_attempts(3)
        .execute(&client)
        .await
        .unwrap_err();

    assert_eq!(transport.contacted(), vec![3, 4, 3]);
    match err {
        Error::NodeRejected {
            status,
            retryable,
            node,
            ..
        } => {
            assert_eq!(status, Status::Busy);
            assert!(retryable);
            assert_eq!(node, AccountId::from_num(3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unusable_overrides_are_rejected_locally() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let err = transfer().with_max_attempts(0).execute(&client).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = transfer()
        .with_backoff(Duration::from_millis(50), Duration::from_millis(5))
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    // Longer than the 5s request timeout of the fixture
    let err = transfer()
        .with_attempt_timeout(Duration::from_secs(30))
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_response_is_a_transport_failure() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::Bytes(vec![0xde, 0xad]));
    transport.push(4, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    let response = transfer()
        .with_node_account_ids(mock::ids(&[3, 4]))
        .execute(&client)
        .await
        .unwrap();
    assert_eq!(response.node_account_id, AccountId::from_num(4));
    assert!(health(&client, 3) < 100);
}

#[tokio::test]
async fn test_deadline_reports_last_error() {
    let transport = mock::MockTransport::new();
    for _ in 0..10 {
        transport.push(3, Reply::Hang);
    }
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let err = transfer()
        .with_attempt_timeout(Duration::from_millis(40))
        .with_request_timeout(Duration::from_millis(100))
        .execute(&client)
        .await
        .unwrap_err();

    match err {
        Error::DeadlineExceeded {
            attempts,
            last_error,
            operation_id,
            ..
        } => {
            assert!(attempts >= 1);
            assert!(operation_id.is_some());
            let last = last_error.expect("last error kept");
            assert!(matches!(
                *last,
                Error::Transport {
                    source: TransportError::Timeout,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_attempt() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::Hang);
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = transfer()
        .with_attempt_timeout(Duration::from_secs(5))
        .with_request_timeout(Duration::from_secs(10))
        .with_cancellation(token)
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { operation_id: Some(_) }));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    let (client, _) = mock::client(mock::config(&[3]), &transport);

    let token = CancellationToken::new();
    token.cancel();
    let err = transfer()
        .with_cancellation(token)
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_local_failures_never_reach_the_network() {
    let transport = mock::MockTransport::new();
    let client = mock::bare_client(mock::config(&[3]), &transport);

    // No operator and no explicit id: nobody pays
    let err = transfer().freeze_with(&client).unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "payer", .. }));

    // Frozen with an explicit id but unsigned
    let id = crate::OperationId::generate(AccountId::from_num(OPERATOR));
    let err = transfer()
        .with_operation_id(id)
        .execute(&client)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "operator", .. }));
    assert!(err.is_local());

    let err = transfer()
        .with_node_account_ids(mock::ids(&[99]))
        .with_operation_id(id)
        .freeze_with(&client)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownNode(_)));

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_presigned_transaction_needs_no_operator() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    let client = mock::bare_client(mock::config(&[3]), &transport);

    let key = PrivateKey::generate();
    let id = crate::OperationId::generate(AccountId::from_num(OPERATOR));
    let frozen = transfer()
        .with_operation_id(id)
        .freeze_with(&client)
        .unwrap()
        .sign(Arc::new(key.clone()))
        .unwrap();

    let response = frozen.execute(&client).await.unwrap();
    assert_eq!(response.operation_id, id);
    assert_eq!(transport.calls()[0].envelope().signatures[0].public_key, key.public_key());
}

#[tokio::test]
async fn test_signing_failure_is_not_retried() {
    let transport = mock::MockTransport::new();
    transport.push(3, Reply::submit(Status::Ok));
    let client = mock::bare_client(mock::config(&[3]), &transport);

    let public_key = PrivateKey::generate().public_key();
    let device = CallbackKey::new(public_key, |_: &[u8]| Err("device unplugged".to_string()));
    client.set_operator(AccountId::from_num(OPERATOR), Arc::new(device));

    let err = transfer().execute(&client).await.unwrap_err();
    assert!(matches!(err, Error::Signing { .. }));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_ping() {
    let transport = mock::MockTransport::new();
    transport.push(
        4,
        Reply::answer(crate::codec::QueryAnswer::AccountBalance {
            account_id: AccountId::from_num(4),
            balance: 0,
        }),
    );
    let client = mock::bare_client(mock::config(&[3, 4]), &transport);

    client.ping(AccountId::from_num(4)).await.unwrap();
    assert_eq!(transport.contacted(), vec![4]);

    // Single attempt, no failover to node 3
    assert!(client.ping(AccountId::from_num(4)).await.is_err());
    assert_eq!(transport.contacted(), vec![4, 4]);
}
