use std::time::Duration;

use tokio::sync::oneshot;
use tonic::Code;
use tonic::Status;

use crate::mock_rpc::MockEtcd;
use crate::mock_rpc_service::MockNode;
use crate::pb::kv_client::KvClient;
use crate::pb::lease_client::LeaseClient;
use crate::pb::response_op;
use crate::pb::v3lockpb::lock_client::LockClient;
use crate::pb::v3lockpb::LockRequest;
use crate::pb::v3lockpb::UnlockRequest;
use crate::pb::watch_client::WatchClient;
use crate::pb::Compare;
use crate::pb::DeleteRangeRequest;
use crate::pb::LeaseGrantRequest;
use crate::pb::LeaseKeepAliveRequest;
use crate::pb::LeaseRevokeRequest;
use crate::pb::PutRequest;
use crate::pb::RangeRequest;
use crate::pb::RequestOp;
use crate::pb::TxnRequest;
use crate::prefix_range_end;
use crate::Client;
use crate::ClientConfig;
use crate::Error;

#[tokio::test]
async fn test_put_then_range_round_trip() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::default(), rx).await;

    let created = client
        .put(PutRequest {
            key: b"config/max-conns".to_vec(),
            value: b"64".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();
    let create_revision = created.header.unwrap().revision;

    let updated = client
        .put(PutRequest {
            key: b"config/max-conns".to_vec(),
            value: b"128".to_vec(),
            prev_kv: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.prev_kv.unwrap().value, b"64".to_vec());

    let response = client
        .range(RangeRequest {
            key: b"config/max-conns".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.count, 1);
    let kv = &response.kvs[0];
    assert_eq!(kv.value, b"128".to_vec());
    assert_eq!(kv.create_revision, create_revision);
    assert!(kv.mod_revision > kv.create_revision);
    assert_eq!(kv.version, 2);
}

#[tokio::test]
async fn test_delete_range_covers_prefix() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::default(), rx).await;

    for key in ["jobs/1", "jobs/2", "spare"] {
        client
            .put(PutRequest {
                key: key.as_bytes().to_vec(),
                value: b"x".to_vec(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let deleted = client
        .delete_range(DeleteRangeRequest {
            key: b"jobs/".to_vec(),
            range_end: prefix_range_end(b"jobs/"),
            prev_kv: true,
        })
        .await
        .unwrap();
    assert_eq!(deleted.deleted, 2);
    assert_eq!(deleted.prev_kvs.len(), 2);

    let remaining = client
        .range(RangeRequest {
            key: b"\0".to_vec(),
            range_end: b"\0".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(remaining.count, 1);
    assert_eq!(remaining.kvs[0].key, b"spare".to_vec());
}

#[tokio::test]
async fn test_txn_conditional_create_takes_both_branches() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::default(), rx).await;

    let txn = TxnRequest {
        compare: vec![Compare::key_not_exists(b"leader".to_vec())],
        success: vec![RequestOp::put(b"leader".to_vec(), b"node-1".to_vec())],
        failure: vec![RequestOp::get(b"leader".to_vec())],
    };

    let first = client.txn(txn.clone()).await.unwrap();
    assert!(first.succeeded);
    assert_eq!(first.responses.len(), 1);
    match &first.responses[0].response {
        Some(response_op::Response::ResponsePut(_)) => {}
        other => panic!("expected put response, got {other:?}"),
    }

    let second = client.txn(txn).await.unwrap();
    assert!(!second.succeeded);
    match &second.responses[0].response {
        Some(response_op::Response::ResponseRange(range)) => {
            assert_eq!(range.kvs.len(), 1);
            assert_eq!(range.kvs[0].value, b"node-1".to_vec());
        }
        other => panic!("expected range response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lease_lifecycle_deletes_attached_keys() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::default(), rx).await;

    let lease = client
        .lease_grant(LeaseGrantRequest { ttl: 60, id: 0 })
        .await
        .unwrap();
    assert!(lease.id > 0);
    assert_eq!(lease.ttl, 60);

    client
        .put(PutRequest {
            key: b"session/worker-3".to_vec(),
            value: b"alive".to_vec(),
            lease: lease.id,
            ..Default::default()
        })
        .await
        .unwrap();

    let refreshed = client
        .lease_keep_alive(LeaseKeepAliveRequest { id: lease.id })
        .await
        .unwrap();
    assert_eq!(refreshed.id, lease.id);
    assert_eq!(refreshed.ttl, 60);

    client
        .lease_revoke(LeaseRevokeRequest { id: lease.id })
        .await
        .unwrap();

    let gone = client
        .range(RangeRequest {
            key: b"session/worker-3".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(gone.count, 0);
}

#[tokio::test]
async fn test_lease_keep_alive_surfaces_closed_stream() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::closing_keep_alive(), rx).await;

    let error = client
        .lease_keep_alive(LeaseKeepAliveRequest { id: 42 })
        .await
        .unwrap_err();
    assert!(matches!(error, Error::StreamClosed));
}

#[tokio::test]
async fn test_lock_contention_serializes_holders() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let client = MockNode::mock_client(MockEtcd::default(), rx).await;

    let first = client
        .lock(LockRequest {
            name: b"jobs/leader".to_vec(),
            lease: 101,
        })
        .await
        .unwrap();

    let contender = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .lock(LockRequest {
                    name: b"jobs/leader".to_vec(),
                    lease: 202,
                })
                .await
                .unwrap()
        })
    };

    // Give the contender time to reach the service and park.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!contender.is_finished());

    client
        .unlock(UnlockRequest {
            key: first.key.clone(),
        })
        .await
        .unwrap();

    let second = contender.await.unwrap();
    assert_ne!(second.key, first.key);

    client
        .unlock(UnlockRequest { key: second.key })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rpc_errors_surface_code_and_message() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let mock = MockEtcd::failing(Status::unavailable("etcdserver: leader changed"));
    let client = MockNode::mock_client(mock, rx).await;

    let error = client
        .range(RangeRequest {
            key: b"any".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some(Code::Unavailable));
    match error {
        Error::Rpc(status) => assert_eq!(status.message(), "etcdserver: leader changed"),
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_build_fails_fast_when_endpoint_unreachable() {
    let outcome = Client::builder("127.0.0.1:1")
        .connect_timeout(Duration::from_millis(200))
        .build()
        .await;

    match outcome {
        Err(Error::Transport(_)) => {}
        Err(other) => panic!("expected transport error, got {other:?}"),
        Ok(_) => panic!("expected connection failure"),
    }
}

#[tokio::test]
async fn test_with_channel_and_from_parts_constructors() {
    let (_shutdown, rx) = oneshot::channel::<()>();
    let addr = MockNode::mock_listener(MockEtcd::default(), rx)
        .await
        .unwrap();

    let channel = MockNode::mock_channel(addr).await;
    let client = Client::with_channel(channel.clone(), ClientConfig::default());
    client
        .put(PutRequest {
            key: b"alpha".to_vec(),
            value: b"1".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();

    let parts = Client::from_parts(
        KvClient::new(channel.clone()),
        WatchClient::new(channel.clone()),
        LeaseClient::new(channel.clone()),
        LockClient::new(channel),
    );
    let response = parts
        .range(RangeRequest {
            key: b"alpha".to_vec(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.kvs[0].value, b"1".to_vec());
    assert!(!parts.config().enable_compression);
}
