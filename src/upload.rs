//! Persists finalized recordings

use crate::error::UploadError;
use crate::store::{ObjectStore, StoredObject};
use std::sync::Arc;
use tracing::{error, info};

/// Writes one finalized blob to the object store
///
/// One `put` per call; a failed upload is abandoned, never resumed or retried.
#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn upload(
        &self,
        key: &str,
        blob: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, UploadError> {
        let size = blob.len();
        info!(
            "Uploading {} ({} bytes, {}) to {} store",
            key,
            size,
            content_type,
            self.store.name()
        );

        match self.store.put(key, blob, content_type).await {
            Ok(stored) => {
                info!("Upload complete: {} ({} bytes)", stored.key, stored.size);
                Ok(stored)
            }
            Err(e) => {
                error!("Upload failed for {}: {}", key, e);
                Err(UploadError {
                    key: key.to_string(),
                    source: e,
                })
            }
        }
    }
}
