use super::stats::CatalogEntry;
use crate::error::ListError;
use crate::store::{ObjectStore, StoredObject};
use futures::future::try_join_all;

/// Policy for turning a listing into displayable entries
#[async_trait::async_trait]
pub trait UrlResolver: Send + Sync {
    async fn resolve(
        &self,
        store: &dyn ObjectStore,
        objects: Vec<StoredObject>,
    ) -> Result<Vec<CatalogEntry>, ListError>;
}

/// Resolves every URL concurrently; one failure fails the whole batch
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOrNothingResolver;

#[async_trait::async_trait]
impl UrlResolver for AllOrNothingResolver {
    async fn resolve(
        &self,
        store: &dyn ObjectStore,
        objects: Vec<StoredObject>,
    ) -> Result<Vec<CatalogEntry>, ListError> {
        try_join_all(objects.into_iter().map(|object| async move {
            match store.signed_url(&object.key).await {
                Ok(url) => Ok(CatalogEntry::new(object, url)),
                Err(source) => Err(ListError::SignedUrl {
                    key: object.key,
                    source,
                }),
            }
        }))
        .await
    }
}
