//! Discovery Service Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: infrastructure, snapshot
//! generation, the discovery protocol itself and the client transport.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (io, tasks, listeners)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Snapshot generation failures for one group
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Malformed or unsupported discovery requests and responses
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Client side connection and stream failures
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Background task panicked: {0}")]
    TaskPanicked(String),

    #[error("Failed to send shutdown signal: {0}")]
    SignalSenderClosed(String),

    #[error("Certificate generation failed: {0}")]
    Certificate(String),

    #[error("Internal server error")]
    ServerUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Backing store could not be read
    #[error("Workload store unavailable: {0}")]
    Store(String),

    /// Generator failed to build resources for a group
    #[error("Failed to generate snapshot for group {key}: {reason}")]
    Failed { key: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Could not parse fetch-timeout: {0}")]
    InvalidFetchTimeout(String),

    #[error("Malformed discovery request: {0}")]
    MalformedRequest(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedType(String),

    #[error("Unexpected resource type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    #[error("Failed to decode resource: {0}")]
    Decode(#[from] prost::DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Server URL scheme is neither grpc nor grpcs
    #[error("Unsupported scheme {0:?}, expected grpc or grpcs")]
    InvalidScheme(String),

    #[error("Invalid server URI: {0}")]
    InvalidUri(String),

    #[error("Failed to connect: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    #[error("RPC failed: {0}")]
    Status(#[from] tonic::Status),

    /// Remote side closed the stream
    #[error("Discovery stream closed")]
    StreamClosed,

    /// Downstream consumer of target groups went away
    #[error("Target group sink closed")]
    SinkClosed,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::System(SystemError::TaskFailed(e))
    }
}

impl From<tonic::Status> for Error {
    fn from(e: tonic::Status) -> Self {
        Error::Transport(TransportError::Status(e))
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        Error::Transport(TransportError::Connect(e))
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Protocol(ProtocolError::Decode(e))
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Protocol(e) => tonic::Status::invalid_argument(e.to_string()),
            Error::Generation(e) => tonic::Status::unavailable(e.to_string()),
            Error::Transport(TransportError::Status(status)) => status,
            other => tonic::Status::internal(other.to_string()),
        }
    }
}
