// Address-book discovery and registry refresh

use std::time::Duration;

use super::mock::{self, Reply};
use crate::codec::{QueryAnswer, QueryData};
use crate::error::Error;
use crate::execute::ExecutionOptions;
use crate::status::Status;
use crate::types::{AccountId, NodeAddress};

fn book(nodes: &[u64]) -> Reply {
    Reply::answer(QueryAnswer::AddressBook(
        nodes.iter().map(|&n| mock::address(n)).collect(),
    ))
}

#[tokio::test]
async fn test_refresh_replaces_the_node_set() {
    let transport = mock::MockTransport::new();
    transport.push(3, book(&[3, 5, 6]));
    let client = mock::bare_client(mock::config(&[3]), &transport);

    let before = client.network();
    let in_flight = client.context(&ExecutionOptions::default());

    let snapshot = client.refresh_network().await.unwrap();
    assert_eq!(snapshot.node_ids(), mock::ids(&[3, 5, 6]));
    assert_eq!(snapshot.generation(), before.generation() + 1);
    assert_eq!(client.network().len(), 3);
    assert!(matches!(transport.calls()[0].query().data, QueryData::AddressBook));

    // Executions that already started keep their snapshot
    assert_eq!(in_flight.snapshot.len(), 1);
    assert_eq!(before.len(), 1);
}

#[tokio::test]
async fn test_surviving_nodes_keep_their_health() {
    let transport = mock::MockTransport::new();
    transport.push(4, Reply::submit(Status::Busy));
    transport.push(3, book(&[3, 4]));
    let (client, _) = mock::client(mock::config(&[3, 4]), &transport);

    // Penalize node 4, then refresh through node 3
    let _ = crate::transaction::TransferTransaction::default()
        .add_send(AccountId::from_num(mock::OPERATOR), AccountId::from_num(9), 1)
        .with_node_account_ids(mock::ids(&[4]))
        .with_max_attempts(1)
        .execute(&client)
        .await;
    let penalized = client.network().get(&AccountId::from_num(4)).unwrap().health();
    assert!(penalized < 100);

    let snapshot = client.refresh_network().await.unwrap();
    assert_eq!(
        snapshot.get(&AccountId::from_num(4)).unwrap().health(),
        penalized
    );
}

#[tokio::test]
async fn test_empty_book_keeps_current_topology() {
    let transport = mock::MockTransport::new();
    transport.push(3, book(&[]));
    transport.push(
        3,
        Reply::answer(QueryAnswer::AddressBook(vec![NodeAddress {
            account_id: AccountId::from_num(8),
            endpoints: vec![],
            description: "no endpoints".to_string(),
        }])),
    );
    let client = mock::bare_client(mock::config(&[3]), &transport);

    assert!(matches!(client.refresh_network().await, Err(Error::NoNodes)));
    assert!(matches!(client.refresh_network().await, Err(Error::NoNodes)));
    assert_eq!(client.network().node_ids(), mock::ids(&[3]));
    assert_eq!(client.network().generation(), 0);
}

#[tokio::test]
async fn test_bootstrap_nodes_serve_the_address_book() {
    let transport = mock::MockTransport::new();
    transport.push(9, book(&[3, 4]));
    let config = mock::config(&[3]).with_bootstrap_nodes(vec![mock::address(9)]);
    let client = mock::bare_client(config, &transport);

    client.refresh_network().await.unwrap();
    assert_eq!(transport.contacted(), vec![9]);
    assert_eq!(client.network().node_ids(), mock::ids(&[3, 4]));
}

#[tokio::test]
async fn test_periodic_updates_until_cancelled() {
    let transport = mock::MockTransport::new();
    transport.push(3, book(&[3, 4]));
    let config = mock::config(&[3]).with_network_update_period(Some(Duration::from_secs(1)));
    let client = mock::bare_client(config, &transport);

    let token = client.spawn_network_updates().expect("period configured");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(client.network().node_ids(), mock::ids(&[3, 4]));

    token.cancel();
    assert!(mock::bare_client(mock::config(&[3]), &transport)
        .spawn_network_updates()
        .is_none());
}

#[tokio::test]
async fn test_frozen_transaction_survives_a_shrinking_refresh() {
    let transport = mock::MockTransport::new();
    let config = mock::config(&[3, 4, 5]).with_bootstrap_nodes(vec![mock::address(9)]);
    let (client, _) = mock::client(config, &transport);

    let frozen = crate::transaction::TransferTransaction::default()
        .add_send(AccountId::from_num(mock::OPERATOR), AccountId::from_num(9), 1)
        .freeze_with(&client)
        .unwrap();
    assert_eq!(frozen.node_account_ids(), &mock::ids(&[3, 4, 5])[..]);

    // Node 4 leaves the network after the bodies were frozen
    transport.push(9, book(&[3, 5]));
    client.refresh_network().await.unwrap();
    transport.push(3, Reply::submit(Status::Ok));
    transport.push(5, Reply::submit(Status::Ok));

    let response = frozen.execute(&client).await.unwrap();
    assert_ne!(response.node_account_id, AccountId::from_num(4));
    assert!(!transport.contacted().contains(&4));
}
