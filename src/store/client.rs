use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Metadata of an object held by the store
///
/// `size` and `last_modified_ms` always come from the store, never from local
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Unique key of the object
    pub key: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time, epoch milliseconds
    pub last_modified_ms: i64,
}

/// Key-addressed blob storage
///
/// Implementations:
/// - [`FsObjectStore`](super::FsObjectStore): objects as files under a root directory
/// - test doubles with failure injection
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object currently in the store
    async fn list(&self) -> Result<Vec<StoredObject>, StoreError>;

    /// Issue a time-limited, read-only URL for one object
    async fn signed_url(&self, key: &str) -> Result<String, StoreError>;

    /// Write `blob` under `key`, replacing any existing object
    async fn put(
        &self,
        key: &str,
        blob: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StoreError>;

    /// Remove one object
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Get store name for logging
    fn name(&self) -> &str;
}
