use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;
use tracing::error;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::RpcError;

/// Channel client a handler can use to identify (or call back) the sender.
///
/// Always the same object for a given channel.
#[cfg_attr(test, automock)]
pub trait TransportClient: Send + Sync + 'static {
    /// Authenticated client id, if the channel was authenticated
    fn client_id(&self) -> Option<String>;

    fn remote_address(&self) -> Option<SocketAddr>;
}

/// Completion of one RPC. Consumed by the call, so it fires exactly once.
pub trait RpcResponseCallback: Send + 'static {
    fn on_success(
        self: Box<Self>,
        response: Bytes,
    );

    fn on_failure(
        self: Box<Self>,
        error: Error,
    );
}

/// Tracks the streams currently being fetched by clients
#[cfg_attr(test, automock)]
pub trait StreamManager: Send + Sync + 'static {
    fn get_chunk(
        &self,
        stream_id: u64,
        chunk_index: u32,
    ) -> Result<Bytes>;

    /// Releases whatever the terminated channel was fetching
    fn connection_terminated(
        &self,
        client_id: &str,
    ) {
        let _ = client_id;
    }
}

/// Server-side handler for RPC messages.
///
/// `receive` is never called concurrently for the same channel.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Handles a single RPC message.
    ///
    /// Any error must be reported through `callback.on_failure`; it is sent back
    /// to the client as a standard RPC failure.
    async fn receive(
        &self,
        client: Arc<dyn TransportClient>,
        message: Bytes,
        callback: Box<dyn RpcResponseCallback>,
    );

    fn stream_manager(&self) -> Arc<dyn StreamManager>;

    /// Handles a message that expects no reply. Any response produced by
    /// `receive` is only logged.
    async fn receive_one_way(
        &self,
        client: Arc<dyn TransportClient>,
        message: Bytes,
    ) {
        self.receive(client, message, Box::new(OneWayRpcCallback)).await
    }

    /// The channel of `client` became active
    fn channel_active(
        &self,
        client: &dyn TransportClient,
    ) {
        let _ = client;
    }

    /// The channel of `client` is gone; no further requests will come from it
    fn channel_inactive(
        &self,
        client: &dyn TransportClient,
    ) {
        let _ = client;
    }

    fn exception_caught(
        &self,
        cause: &Error,
        client: &dyn TransportClient,
    ) {
        let _ = (cause, client);
    }
}

/// Callback used for one-way messages
pub(crate) struct OneWayRpcCallback;

impl RpcResponseCallback for OneWayRpcCallback {
    fn on_success(
        self: Box<Self>,
        _response: Bytes,
    ) {
        warn!("Response provided for one-way RPC.");
    }

    fn on_failure(
        self: Box<Self>,
        error: Error,
    ) {
        error!(?error, "Error response provided for one-way RPC.");
    }
}

/// Stream manager for handlers that serve no streams
#[derive(Debug, Default)]
pub struct EmptyStreamManager;

impl StreamManager for EmptyStreamManager {
    fn get_chunk(
        &self,
        stream_id: u64,
        chunk_index: u32,
    ) -> Result<Bytes> {
        Err(RpcError::Unsupported(format!("no stream {stream_id} (chunk {chunk_index})")).into())
    }
}

/// Handler that rejects every message
#[derive(Debug, Default)]
pub struct NoOpRpcHandler {
    streams: Arc<EmptyStreamManager>,
}

#[async_trait]
impl RpcHandler for NoOpRpcHandler {
    async fn receive(
        &self,
        _client: Arc<dyn TransportClient>,
        _message: Bytes,
        callback: Box<dyn RpcResponseCallback>,
    ) {
        callback.on_failure(RpcError::Unsupported("Cannot handle messages".to_string()).into());
    }

    fn stream_manager(&self) -> Arc<dyn StreamManager> {
        self.streams.clone()
    }
}
