use crate::keys::display_id;
use crate::store::StoredObject;
use serde::{Deserialize, Serialize};

/// A listed object with its display URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub object: StoredObject,

    /// Human-readable identifier derived from the key
    pub display_id: String,

    /// Time-limited URL resolved during the refresh that installed this entry
    pub signed_url: String,
}

impl CatalogEntry {
    pub fn new(object: StoredObject, signed_url: String) -> Self {
        Self {
            display_id: display_id(&object.key),
            object,
            signed_url,
        }
    }

    pub fn key(&self) -> &str {
        &self.object.key
    }
}

/// Aggregates over the current catalog entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of entries
    pub count: usize,

    /// Sum of entry sizes in bytes
    pub total_size: u64,

    /// Most recent last-modified timestamp (epoch ms), `None` when empty
    pub latest: Option<i64>,
}

impl CatalogStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut stats, entry| {
            stats.count += 1;
            stats.total_size += entry.object.size;
            stats.latest = Some(match stats.latest {
                Some(latest) => latest.max(entry.object.last_modified_ms),
                None => entry.object.last_modified_ms,
            });
            stats
        })
    }
}
