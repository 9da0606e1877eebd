//! Remote cleanup requests and the filesystem checkpoint store

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use d_cleaner::CheckpointStore;
use d_cleaner::CleanupRequest;
use d_cleaner::CleanupRpcHandler;
use d_cleaner::CleanupTask;
use d_cleaner::ContextCleaner;
use d_cleaner::Error;
use d_cleaner::FsCheckpointStore;
use d_cleaner::RpcHandler;
use d_cleaner::RpcResponseCallback;
use d_cleaner::TransportClient;
use tokio::sync::oneshot;

use crate::common::collaborators;
use crate::common::enable_logger;
use crate::common::quick_config;
use crate::common::start_cleaner;
use crate::common::Cluster;

struct Executor;

impl TransportClient for Executor {
    fn client_id(&self) -> Option<String> {
        Some("executor-3".to_string())
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        "10.0.0.3:41000".parse().ok()
    }
}

struct Reply(oneshot::Sender<std::result::Result<Bytes, String>>);

impl RpcResponseCallback for Reply {
    fn on_success(
        self: Box<Self>,
        response: Bytes,
    ) {
        let _ = self.0.send(Ok(response));
    }

    fn on_failure(
        self: Box<Self>,
        error: Error,
    ) {
        let _ = self.0.send(Err(error.to_string()));
    }
}

async fn call(
    handler: &CleanupRpcHandler,
    message: Bytes,
) -> std::result::Result<Bytes, String> {
    let (tx, rx) = oneshot::channel();
    handler.receive(Arc::new(Executor), message, Box::new(Reply(tx))).await;
    rx.await.expect("callback must fire")
}

#[tokio::test]
async fn test_remote_request_cleans_and_notifies() {
    let (cleaner, cluster, notifications) = start_cleaner(quick_config());
    let handler = CleanupRpcHandler::new(cleaner.clone());

    let message = CleanupRequest {
        task: CleanupTask::Broadcast(77),
        blocking: Some(true),
    }
    .encode()
    .unwrap();
    let reply = call(&handler, message).await;

    assert_eq!(reply, Ok(Bytes::new()));
    assert!(cluster.finished(CleanupTask::Broadcast(77)));
    assert_eq!(notifications.seen(), vec![CleanupTask::Broadcast(77)]);

    cleaner.stop().await;
}

#[tokio::test]
async fn test_remote_request_failure_is_returned() {
    let (cleaner, cluster, notifications) = start_cleaner(quick_config());
    cluster.fail(CleanupTask::Rdd(5));
    let handler = CleanupRpcHandler::new(cleaner.clone());

    let message = CleanupRequest {
        task: CleanupTask::Rdd(5),
        blocking: None,
    }
    .encode()
    .unwrap();
    let reply = call(&handler, message).await;

    assert!(reply.is_err());
    assert!(notifications.seen().is_empty());

    cleaner.stop().await;
}

#[tokio::test]
async fn test_garbage_request_is_rejected() {
    let (cleaner, cluster, _) = start_cleaner(quick_config());
    let handler = CleanupRpcHandler::new(cleaner.clone());

    let reply = call(&handler, Bytes::from_static(b"\x09\x00")).await;

    assert!(reply.is_err());
    assert!(cluster.events().is_empty());

    cleaner.stop().await;
}

#[tokio::test]
async fn test_fs_checkpoint_store_behind_the_cleaner() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsCheckpointStore::new(dir.path()));
    let artifacts = store.checkpoint_path(3);
    tokio::fs::create_dir_all(artifacts.join("part-00000")).await.unwrap();
    tokio::fs::write(artifacts.join("part-00000/data"), b"rows").await.unwrap();

    let cluster = Arc::new(Cluster::default());
    let mut wiring = collaborators(&cluster);
    wiring.checkpoints = store.clone();
    let mut config = quick_config();
    config.clean_checkpoints = true;
    let cleaner = ContextCleaner::new(config, wiring);

    cleaner.cleanup_checkpoint(3).await.unwrap();
    assert!(!artifacts.exists());

    // Deleting again is not an error
    cleaner.cleanup_checkpoint(3).await.unwrap();
    store.delete_checkpoint_artifacts(99).await.unwrap();
}
