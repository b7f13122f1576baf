//! Error taxonomy for capture, upload and catalog operations
//!
//! Every failure is surfaced to the caller as one of these types. Nothing here
//! is retried automatically; a retry is always a fresh caller-initiated action.

use crate::session::SessionState;
use thiserror::Error;

/// Failure reported by an [`ObjectStore`](crate::store::ObjectStore) round trip
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("store quota exceeded")]
    QuotaExceeded,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The capture device could not be opened
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("microphone access denied: {0}")]
    Denied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Persisting a finalized recording failed
#[derive(Debug, Error)]
#[error("failed to upload {key}: {source}")]
pub struct UploadError {
    pub key: String,
    #[source]
    pub source: StoreError,
}

/// Catalog refresh failed; no partial catalog is installed
#[derive(Debug, Error)]
pub enum ListError {
    #[error("failed to list objects: {0}")]
    Store(#[source] StoreError),

    #[error("failed to resolve signed URL for {key}: {source}")]
    SignedUrl {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Deleting a stored object failed; the catalog entry is left in place
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("delete already in progress for {0}")]
    InProgress(String),

    #[error("failed to delete {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Errors returned by [`RecordingSession`](crate::session::RecordingSession) operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}
