use super::client::{ObjectStore, StoredObject};
use crate::capture::CONTENT_TYPE_WEBM;
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker prefix of in-flight uploads; never listed
const PARTIAL_PREFIX: &str = ".upload-";

/// How signed URLs are built and verified
#[derive(Debug, Clone)]
pub struct SignedUrlConfig {
    /// Prefix the object path is appended to (e.g. "http://127.0.0.1:3000/objects")
    pub public_base_url: String,

    /// Secret mixed into every signature
    pub secret: String,

    /// How long an issued URL stays valid
    pub ttl: Duration,
}

impl Default for SignedUrlConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:3000/objects".to_string(),
            secret: "change-me".to_string(),
            ttl: Duration::seconds(900),
        }
    }
}

/// Object store keeping each object as a file under `root`
///
/// `public/voice-1.webm` lives at `<root>/public/voice-1.webm`.
pub struct FsObjectStore {
    root: PathBuf,
    signing: SignedUrlConfig,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>, signing: SignedUrlConfig) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        info!("Filesystem object store opened at {}", root.display());

        Ok(Self { root, signing })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto its file path, rejecting keys that escape the root
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Read an object's bytes
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| not_found_or_io(key, e))
    }

    /// Signed URL for `key` as issued at `now`
    pub fn signed_url_at(&self, key: &str, now: DateTime<Utc>) -> String {
        let expires = (now + self.signing.ttl).timestamp();
        let signature = self.signature(key, expires);
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/{}?expires={}&signature={}",
            self.signing.public_base_url.trim_end_matches('/'),
            encoded_key,
            expires,
            signature
        )
    }

    /// Check a signature issued by [`signed_url_at`](Self::signed_url_at)
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            debug!("Signed URL for {} expired at {}", key, expires);
            return false;
        }
        let Ok(presented) = hex::decode(signature) else {
            debug!("Malformed signature for {}", key);
            return false;
        };
        constant_time_eq(&self.digest(key, expires), &presented)
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        hex::encode(self.digest(key, expires))
    }

    fn digest(&self, key: &str, expires: i64) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.signing.secret.as_bytes());
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(expires.to_string().as_bytes());
        hasher.finalize().to_vec()
    }

    async fn describe(&self, key: &str, path: &Path) -> Result<StoredObject, StoreError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        let modified: DateTime<Utc> = metadata.modified()?.into();

        Ok(StoredObject {
            key: key.to_string(),
            size: metadata.len(),
            last_modified_ms: modified.timestamp_millis(),
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self) -> Result<Vec<StoredObject>, StoreError> {
        let mut objects = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    debug!("Skipping non UTF-8 entry in {}", dir.display());
                    continue;
                };
                if name.starts_with(PARTIAL_PREFIX) {
                    continue;
                }

                let key = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if file_type.is_file() {
                    objects.push(self.describe(&key, &entry.path()).await?);
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!("Listed {} objects under {}", objects.len(), self.root.display());

        Ok(objects)
    }

    async fn signed_url(&self, key: &str) -> Result<String, StoreError> {
        let path = self.object_path(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(self.signed_url_at(key, Utc::now()))
    }

    async fn put(
        &self,
        key: &str,
        blob: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StoreError> {
        if content_type != CONTENT_TYPE_WEBM {
            return Err(StoreError::Rejected(format!(
                "unsupported content type {}",
                content_type
            )));
        }

        let path = self.object_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        tokio::fs::create_dir_all(parent).await?;

        // Write next to the target and rename so readers never see a partial object
        let partial = parent.join(format!("{}{}", PARTIAL_PREFIX, uuid::Uuid::new_v4()));
        let size = blob.len();
        tokio::fs::write(&partial, blob).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        info!("Stored {} ({} bytes, {})", key, size, content_type);

        self.describe(key, &path).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        info!("Removed {}", key);

        Ok(())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && !segment.starts_with(PARTIAL_PREFIX)
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn not_found_or_io(key: &str, error: std::io::Error) -> StoreError {
    if error.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(error)
    }
}

/// Byte equality whose running time depends only on the lengths
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
