use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use tonic::async_trait;
use tracing::debug;
use tracing::warn;

use super::rpc_handler::EmptyStreamManager;
use crate::CleanupTask;
use crate::ContextCleaner;
use crate::Result;
use crate::RpcError;
use crate::RpcHandler;
use crate::RpcResponseCallback;
use crate::SerializationError;
use crate::StreamManager;
use crate::TransportClient;

/// Request from a remote node to clean one resource now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupRequest {
    pub task: CleanupTask,
    /// `None` uses the cleaner's configured blocking policy
    pub blocking: Option<bool>,
}

impl CleanupRequest {
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| RpcError::Decode(SerializationError::Bincode(e)).into())
    }
}

/// Runs remote cleanup requests through the cleaner's direct-invocation path.
///
/// Replies with an empty body once the cleanup completed.
pub struct CleanupRpcHandler {
    cleaner: Arc<ContextCleaner>,
    streams: Arc<EmptyStreamManager>,
}

impl CleanupRpcHandler {
    pub fn new(cleaner: Arc<ContextCleaner>) -> Self {
        Self {
            cleaner,
            streams: Arc::new(EmptyStreamManager),
        }
    }
}

#[async_trait]
impl RpcHandler for CleanupRpcHandler {
    async fn receive(
        &self,
        client: Arc<dyn TransportClient>,
        message: Bytes,
        callback: Box<dyn RpcResponseCallback>,
    ) {
        let request = match CleanupRequest::decode(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!(client = ?client.remote_address(), error = %e, "Rejecting malformed cleanup request");
                callback.on_failure(e);
                return;
            }
        };

        debug!(client = ?client.remote_address(), task = %request.task, "Remote cleanup request");
        match self.cleaner.cleanup(request.task, request.blocking).await {
            Ok(()) => callback.on_success(Bytes::new()),
            Err(e) => callback.on_failure(e),
        }
    }

    fn stream_manager(&self) -> Arc<dyn StreamManager> {
        self.streams.clone()
    }
}
