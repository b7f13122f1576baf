use super::resolver::{AllOrNothingResolver, UrlResolver};
use super::stats::{CatalogEntry, CatalogStats};
use crate::error::{DeleteError, ListError};
use crate::store::ObjectStore;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Refreshable view of what currently exists in the object store
pub struct FileCatalog {
    store: Arc<dyn ObjectStore>,

    resolver: Box<dyn UrlResolver>,

    /// Installed entries (key → entry)
    entries: RwLock<BTreeMap<String, CatalogEntry>>,

    /// Keys with a `remove` in flight
    deleting: Mutex<HashSet<String>>,
}

impl FileCatalog {
    /// Catalog using the all-or-nothing URL resolution policy
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_resolver(store, Box::new(AllOrNothingResolver))
    }

    pub fn with_resolver(store: Arc<dyn ObjectStore>, resolver: Box<dyn UrlResolver>) -> Self {
        Self {
            store,
            resolver,
            entries: RwLock::new(BTreeMap::new()),
            deleting: Mutex::new(HashSet::new()),
        }
    }

    /// Pull the authoritative listing and resolve display URLs
    ///
    /// Entries are replaced only if every step succeeds; on failure the
    /// previous entries are left as they were.
    pub async fn refresh(&self) -> Result<Vec<CatalogEntry>, ListError> {
        let objects = self.store.list().await.map_err(|e| {
            error!("Failed to list {} store: {}", self.store.name(), e);
            ListError::Store(e)
        })?;

        let listed = objects.len();
        let resolved = match self.resolver.resolve(self.store.as_ref(), objects).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Catalog refresh failed: {}", e);
                return Err(e);
            }
        };

        let installed: BTreeMap<String, CatalogEntry> = resolved
            .into_iter()
            .map(|entry| (entry.key().to_string(), entry))
            .collect();

        info!(
            "Catalog refreshed: {} objects listed, {} entries installed",
            listed,
            installed.len()
        );

        *self.entries.write() = installed;

        Ok(self.entries())
    }

    /// Delete one object; the entry goes away only after the store confirms
    pub async fn delete(&self, key: &str) -> Result<(), DeleteError> {
        let _guard = DeletingGuard::acquire(&self.deleting, key).ok_or_else(|| {
            warn!("Delete already in progress for {}", key);
            DeleteError::InProgress(key.to_string())
        })?;

        info!("Deleting {}", key);

        match self.store.remove(key).await {
            Ok(()) => {
                self.entries.write().remove(key);
                info!("Deleted {}", key);
                Ok(())
            }
            Err(source) => {
                error!("Failed to delete {}: {}", key, source);
                Err(DeleteError::Store {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Entries, most recently modified first
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<CatalogEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| {
            b.object
                .last_modified_ms
                .cmp(&a.object.last_modified_ms)
                .then_with(|| a.object.key.cmp(&b.object.key))
        });
        entries
    }

    pub fn get(&self, key: &str) -> Option<CatalogEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn is_deleting(&self, key: &str) -> bool {
        self.deleting.lock().contains(key)
    }

    /// Count, total size and latest timestamp over the current entries
    pub fn stats(&self) -> CatalogStats {
        CatalogStats::from_entries(self.entries.read().values())
    }
}

/// Marks a key as deleting for as long as it lives
struct DeletingGuard<'a> {
    deleting: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> DeletingGuard<'a> {
    fn acquire(deleting: &'a Mutex<HashSet<String>>, key: &str) -> Option<Self> {
        if !deleting.lock().insert(key.to_string()) {
            return None;
        }
        Some(Self {
            deleting,
            key: key.to_string(),
        })
    }
}

impl Drop for DeletingGuard<'_> {
    fn drop(&mut self) {
        self.deleting.lock().remove(&self.key);
    }
}
