//! Resource Reclamation Error Hierarchy
//!
//! Defines the error types for the cleaner and the collaborators it drives,
//! categorized by layer: infrastructure, configuration, cleanup and RPC.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

use crate::ResourceKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, serialization, background tasks)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Cleaner configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cleanup lifecycle and collaborator failures
    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    /// Message handling failures
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    //Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures while removing artifacts
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure bound to the path it happened on
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact location is not usable (e.g. a file where a directory is expected)
    #[error("Invalid checkpoint location: {0}")]
    InvalidLocation(String),
}

// Serialization is classified separately (shared by the RPC and storage layers)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// A downstream collaborator refused or failed the removal
    #[error("Failed to clean {kind} {id}: {reason}")]
    Collaborator {
        kind: ResourceKind,
        id: i64,
        reason: String,
    },

    /// A handler panicked while cleaning
    #[error("Handler panicked while cleaning {kind} {id}")]
    Panicked { kind: ResourceKind, id: i64 },

    /// Lifecycle is terminal
    #[error("Cleaner has been stopped and cannot be restarted")]
    AlreadyStopped,

    /// Background tasks need a tokio runtime to run on
    #[error("Cleaner can only be started inside a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Handler does not accept this kind of message
    #[error("Unsupported message: {0}")]
    Unsupported(String),

    /// Payload could not be decoded
    #[error("Malformed request: {0}")]
    Decode(#[from] SerializationError),
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::System(SystemError::Serialization(SerializationError::Bincode(e)))
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Rpc(RpcError::Unsupported(msg)) => tonic::Status::unimplemented(msg),
            Error::Rpc(RpcError::Decode(e)) => tonic::Status::invalid_argument(e.to_string()),
            Error::Config(e) => tonic::Status::failed_precondition(e.to_string()),
            Error::Cleanup(CleanupError::AlreadyStopped) => {
                tonic::Status::unavailable(CleanupError::AlreadyStopped.to_string())
            }
            other => tonic::Status::internal(other.to_string()),
        }
    }
}
