//! Error types for the search engine.

use std::io;
use thiserror::Error;

/// Result type alias for search engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the search engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Network communication errors.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Forward store errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Hash ring errors.
    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    /// Service registry errors.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// No live endpoint is registered for a service.
    #[error("no alive worker for service {0}")]
    NoAliveWorker(String),

    /// Error reported by a remote node.
    #[error("remote error: {0}")]
    Remote(String),

    /// A document was rejected before indexing.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Network communication errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed.
    #[error("connection failed to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to send a request.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a response.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Address parse error.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Forward store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store has been closed.
    #[error("store closed")]
    Closed,

    /// Unknown backend selector in the configuration.
    #[error("unknown store backend: {0}")]
    UnknownBackend(String),

    /// I/O error from the backing store.
    #[error("store io error: {0}")]
    Io(String),
}

/// Consistent hash ring errors.
#[derive(Error, Debug)]
pub enum RingError {
    /// A virtual node with this score is already on the ring.
    #[error("virtual node already exists: {0}")]
    VirtualNodeExists(u32),

    /// No virtual node with this score is on the ring.
    #[error("virtual node not found: {0}")]
    VirtualNodeNotFound(u32),

    /// The colony has no bookkeeping entry on the ring.
    #[error("colony not found: {0}")]
    ColonyNotFound(String),

    /// Predecessor/successor navigation needs more than one entry.
    #[error("ring has too few entries for navigation")]
    RingTooSmall,

    /// The colony's handle cannot export documents for a handoff.
    #[error("colony {0} cannot export documents")]
    TransferUnsupported(String),
}

/// Service registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The lease is unknown or has expired.
    #[error("lease not found: {0}")]
    LeaseNotFound(u64),

    /// The registry client has been closed.
    #[error("registry closed")]
    Closed,
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Network(NetworkError::Serialization(e.to_string()))
    }
}
