//! End-to-end cluster tests: ownership feed, resolver, coordinator, fabric
//! and slave proxy wired together the way members run them

use fleetlink_common::{Datastore, DeviceId, Path, Payload, SessionToken};
use fleetlink_coordinator::testing::{BackendCall, RecordingBackend};
use fleetlink_fabric::{ClusterFabric, FabricClient};
use fleetlink_mastership::{MastershipResolver, OwnershipChange, ResolverConfig, SessionListener};
use fleetlink_protocol::TransactionError;
use fleetlink_proxy::SlaveProxy;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl SessionListener for RecordingListener {
    fn session_down(&self, device: &DeviceId) {
        self.events.lock().push(format!("down:{}", device));
    }

    fn session_terminated(&self, device: &DeviceId) {
        self.events.lock().push(format!("terminated:{}", device));
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

struct Master {
    backend: RecordingBackend,
    resolver: MastershipResolver,
    feed: mpsc::UnboundedSender<OwnershipChange>,
}

fn spawn_master(fabric: &Arc<ClusterFabric>, node: &str, device: &DeviceId) -> Master {
    let backend = RecordingBackend::new();
    let (feed, feed_rx) = mpsc::unbounded_channel();
    let resolver = MastershipResolver::spawn(
        device.clone(),
        Arc::new(backend.clone()),
        FabricClient::new(node, fabric.clone()),
        feed_rx,
        ResolverConfig::default(),
    );
    Master {
        backend,
        resolver,
        feed,
    }
}

fn connect_proxy(
    fabric: &Arc<ClusterFabric>,
    node: &str,
    owner: SessionToken,
    master: &Master,
) -> SlaveProxy {
    SlaveProxy::connect(
        master.resolver.device().clone(),
        owner,
        FabricClient::new(node, fabric.clone()),
        master.resolver.subject().to_string(),
        master.resolver.mastership_watch(),
    )
}

#[tokio::test]
async fn test_slave_write_reaches_backend_through_master() {
    let fabric = ClusterFabric::new();
    let device = DeviceId::new("edge-1");
    let master = spawn_master(&fabric, "node-a", &device);

    master.feed.send(OwnershipChange::BecameOwner).unwrap();
    let probe = FabricClient::new("node-b", fabric.clone());
    wait_until("master endpoint", || {
        probe.has_responders(master.resolver.subject())
    })
    .await;
    assert!(master.resolver.is_master());

    let proxy = connect_proxy(&fabric, "node-b", SessionToken::new(), &master);
    let txn = proxy.new_write_transaction().await.unwrap();
    txn.put(
        Datastore::Configuration,
        Path::from("/a"),
        Payload::new(json!({"mtu": 1500})),
    )
    .await
    .unwrap();
    txn.commit().await.unwrap();

    assert_eq!(
        master.backend.calls(),
        vec![
            BackendCall::NewTransaction,
            BackendCall::Edit("put", Path::from("/a")),
            BackendCall::Commit,
        ]
    );
    assert_eq!(master.backend.commit_count(), 1);
    assert!(master.backend.committed_value(&Path::from("/a")).is_some());
}

#[tokio::test]
async fn test_transaction_is_exclusive_across_slaves() {
    let fabric = ClusterFabric::new();
    let device = DeviceId::new("edge-2");
    let master = spawn_master(&fabric, "node-a", &device);

    master.feed.send(OwnershipChange::BecameOwner).unwrap();
    let probe = FabricClient::new("node-b", fabric.clone());
    wait_until("master endpoint", || {
        probe.has_responders(master.resolver.subject())
    })
    .await;

    let first = connect_proxy(&fabric, "node-b", SessionToken::new(), &master);
    let second = connect_proxy(&fabric, "node-c", SessionToken::new(), &master);

    let txn = first.new_write_transaction().await.unwrap();

    let err = second.new_write_transaction().await.unwrap_err();
    assert!(matches!(err, TransactionError::InUse { .. }));

    // Once the first slave cancels, the second gets its turn
    assert!(txn.cancel().await.unwrap());
    second.new_write_transaction().await.unwrap();
}

#[tokio::test]
async fn test_read_transaction_through_master() {
    let fabric = ClusterFabric::new();
    let device = DeviceId::new("edge-3");
    let master = spawn_master(&fabric, "node-a", &device);

    master.feed.send(OwnershipChange::BecameOwner).unwrap();
    let probe = FabricClient::new("node-b", fabric.clone());
    wait_until("master endpoint", || {
        probe.has_responders(master.resolver.subject())
    })
    .await;

    let proxy = connect_proxy(&fabric, "node-b", SessionToken::new(), &master);
    let txn = proxy.new_read_transaction().await.unwrap();

    assert_eq!(txn.get(Path::from("/missing")).await.unwrap(), None);

    let err = txn
        .put(
            Datastore::Configuration,
            Path::from("/a"),
            Payload::new(json!(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::InvalidState(_)));

    assert!(txn.cancel().await.unwrap());
}

#[tokio::test]
async fn test_mastership_loss_notifies_and_fails_fast_then_fails_over() {
    let fabric = ClusterFabric::new();
    let device = DeviceId::new("edge-4");
    let first = spawn_master(&fabric, "node-a", &device);

    let listener = RecordingListener::new();
    first.resolver.register_listener(listener.clone());

    first.feed.send(OwnershipChange::BecameOwner).unwrap();
    let probe = FabricClient::new("node-b", fabric.clone());
    wait_until("master endpoint", || {
        probe.has_responders(first.resolver.subject())
    })
    .await;

    let proxy = connect_proxy(&fabric, "node-b", SessionToken::new(), &first);
    let txn = proxy.new_write_transaction().await.unwrap();

    // Ownership moves away while the handle is open
    first.feed.send(OwnershipChange::LostOwnership).unwrap();
    wait_until("mastership revoked", || !first.resolver.is_master()).await;

    assert_eq!(listener.events(), vec![format!("down:{}", device)]);

    // In-flight surface fails fast instead of hanging
    let err = txn
        .put(
            Datastore::Configuration,
            Path::from("/a"),
            Payload::new(json!(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::MastershipLost { .. }));

    // The abandoned backend transaction was cancelled during teardown
    wait_until("backend cleanup", || {
        first.backend.calls().contains(&BackendCall::Cancel)
    })
    .await;
    assert_eq!(first.backend.commit_count(), 0);

    // Another member takes over and serves fresh transactions
    let second = spawn_master(&fabric, "node-c", &device);
    second.feed.send(OwnershipChange::BecameOwner).unwrap();
    wait_until("new master endpoint", || {
        probe.has_responders(second.resolver.subject())
    })
    .await;

    let proxy = connect_proxy(&fabric, "node-b", SessionToken::new(), &second);
    let txn = proxy.new_write_transaction().await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(second.backend.commit_count(), 1);
}

#[tokio::test]
async fn test_feed_termination_notifies_listeners() {
    let fabric = ClusterFabric::new();
    let device = DeviceId::new("edge-5");
    let master = spawn_master(&fabric, "node-a", &device);

    let listener = RecordingListener::new();
    master.resolver.register_listener(listener.clone());

    master.feed.send(OwnershipChange::BecameOwner).unwrap();
    let probe = FabricClient::new("node-b", fabric.clone());
    wait_until("master endpoint", || {
        probe.has_responders(master.resolver.subject())
    })
    .await;

    // The ownership subscription itself goes away; the resolver handle
    // stays alive, only the feed ends
    let Master {
        feed,
        resolver,
        backend: _backend,
    } = master;
    drop(feed);
    let _keep_alive = resolver;

    wait_until("termination notice", || {
        listener
            .events()
            .contains(&format!("terminated:{}", device))
    })
    .await;
}
