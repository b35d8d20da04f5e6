//! Behavior tests for the slave proxy against a scripted master endpoint

use fleetlink_common::{Datastore, DeviceId, HandleId, Path, Payload, SessionToken};
use fleetlink_fabric::{ClusterFabric, FabricClient, HandlerRequests};
use fleetlink_protocol::{
    RequestEnvelope, TransactionError, TransactionReply, TransactionRequest, encode_reply,
};
use fleetlink_proxy::SlaveProxy;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

const SUBJECT: &str = "device.edge-1.txn";

fn device() -> DeviceId {
    DeviceId::new("edge-1")
}

/// Master stand-in that acks everything and records operation order
fn spawn_scripted_master(mut requests: HandlerRequests) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        let handle = HandleId::new();
        while let Some((message, reply_tx)) = requests.recv().await {
            let envelope = RequestEnvelope::from_message(message).unwrap();
            log.lock().push(envelope.request.kind().to_string());

            let reply = match &envelope.request {
                TransactionRequest::NewReadTransaction => {
                    TransactionReply::NewReadTransaction { handle }
                }
                TransactionRequest::NewWriteTransaction => {
                    TransactionReply::NewWriteTransaction { handle }
                }
                TransactionRequest::Get { .. } => TransactionReply::Data {
                    payload: Payload::new(json!({"seen": true})),
                },
                TransactionRequest::Cancel => TransactionReply::Cancelled { cancelled: true },
                _ => TransactionReply::Ok,
            };
            let _ = reply_tx.send(encode_reply(&envelope.request_id, &reply));
        }
    });

    seen
}

#[tokio::test]
async fn test_operations_forward_in_call_order() {
    let fabric = ClusterFabric::new();
    let seen = spawn_scripted_master(fabric.register_handler(SUBJECT));
    let client = FabricClient::new("slave-1", fabric);
    let (_up_tx, up_rx) = watch::channel(true);

    let proxy = SlaveProxy::connect(
        device(),
        SessionToken::new(),
        client,
        SUBJECT.to_string(),
        up_rx,
    );

    let txn = proxy.new_write_transaction().await.unwrap();
    txn.put(
        Datastore::Configuration,
        Path::from("/a"),
        Payload::new(json!(1)),
    )
    .await
    .unwrap();
    let value = txn.get(Path::from("/a")).await.unwrap();
    assert!(value.is_some());
    txn.commit().await.unwrap();

    assert_eq!(
        seen.lock().clone(),
        vec!["new_write_transaction", "put", "get", "commit"]
    );
}

#[tokio::test]
async fn test_concurrent_calls_keep_fifo_order() {
    let fabric = ClusterFabric::new();
    let seen = spawn_scripted_master(fabric.register_handler(SUBJECT));
    let client = FabricClient::new("slave-1", fabric);
    let (_up_tx, up_rx) = watch::channel(true);

    let proxy = SlaveProxy::connect(
        device(),
        SessionToken::new(),
        client,
        SUBJECT.to_string(),
        up_rx,
    );
    let txn = proxy.new_write_transaction().await.unwrap();

    // Issue three edits without awaiting in between; the link must deliver
    // them in call order
    let (r1, r2, r3) = tokio::join!(
        txn.put(
            Datastore::Configuration,
            Path::from("/1"),
            Payload::new(json!(1))
        ),
        txn.delete(Datastore::Configuration, Path::from("/2")),
        txn.merge(
            Datastore::Configuration,
            Path::from("/3"),
            Payload::new(json!(3)),
            None
        ),
    );
    r1.unwrap();
    r2.unwrap();
    r3.unwrap();

    assert_eq!(
        seen.lock().clone(),
        vec!["new_write_transaction", "put", "delete", "merge"]
    );
}

#[tokio::test]
async fn test_failure_replies_surface_their_cause() {
    let fabric = ClusterFabric::new();
    let mut requests = fabric.register_handler(SUBJECT);

    tokio::spawn(async move {
        while let Some((message, reply_tx)) = requests.recv().await {
            let envelope = RequestEnvelope::from_message(message).unwrap();
            let reply = TransactionReply::failure(TransactionError::NotOwner);
            let _ = reply_tx.send(encode_reply(&envelope.request_id, &reply));
        }
    });

    let client = FabricClient::new("slave-1", fabric);
    let (_up_tx, up_rx) = watch::channel(true);
    let proxy = SlaveProxy::connect(
        device(),
        SessionToken::new(),
        client,
        SUBJECT.to_string(),
        up_rx,
    );

    let err = proxy.new_write_transaction().await.unwrap_err();
    assert_eq!(err, TransactionError::NotOwner);
}

#[tokio::test]
async fn test_missing_master_fails_fast() {
    let fabric = ClusterFabric::new();
    let client = FabricClient::new("slave-1", fabric);
    let (_up_tx, up_rx) = watch::channel(true);

    // Nothing registered the device subject
    let proxy = SlaveProxy::connect(
        device(),
        SessionToken::new(),
        client,
        SUBJECT.to_string(),
        up_rx,
    );

    let err = proxy.new_write_transaction().await.unwrap_err();
    assert!(matches!(err, TransactionError::MastershipLost { .. }));
}

#[tokio::test]
async fn test_mastership_loss_fails_in_flight_and_queued_calls() {
    let fabric = ClusterFabric::new();
    // Master that accepts the open, then goes silent
    let mut requests = fabric.register_handler(SUBJECT);
    tokio::spawn(async move {
        let mut replied = false;
        let mut held = Vec::new();
        while let Some((message, reply_tx)) = requests.recv().await {
            let envelope = RequestEnvelope::from_message(message).unwrap();
            if !replied {
                replied = true;
                let reply = TransactionReply::NewWriteTransaction {
                    handle: HandleId::new(),
                };
                let _ = reply_tx.send(encode_reply(&envelope.request_id, &reply));
            } else {
                // Hold the reply sender so the request stays in flight
                held.push(reply_tx);
            }
        }
    });

    let client = FabricClient::new("slave-1", fabric);
    let (up_tx, up_rx) = watch::channel(true);
    let proxy = SlaveProxy::connect(
        device(),
        SessionToken::new(),
        client,
        SUBJECT.to_string(),
        up_rx,
    );
    let txn = proxy.new_write_transaction().await.unwrap();

    let pending = tokio::spawn(async move {
        txn.put(
            Datastore::Configuration,
            Path::from("/a"),
            Payload::new(json!(1)),
        )
        .await
    });

    // Give the put a moment to get in flight, then revoke mastership
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    up_tx.send(false).unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, TransactionError::MastershipLost { .. }));

    // Calls issued after the loss fail without touching the fabric
    let err = proxy.new_write_transaction().await.unwrap_err();
    assert!(matches!(err, TransactionError::MastershipLost { .. }));
}
