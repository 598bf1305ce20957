//! Document store trait for asynchronous entity lookups.
//!
//! This is the narrow seam between the entity cache and whichever backend
//! holds the documents. Every method is one round trip.

use async_trait::async_trait;
use charmstore_core::{BaseEntity, CharmStoreResult, CharmUrl, Entity, FieldSet};

/// Async document store.
///
/// # Projection contract
///
/// Returned documents must populate at least the requested fields. They may
/// populate more. An empty field set lets the store choose.
///
/// # Errors
///
/// Single lookups fail with `StoreError::NotFound` when no document matches
/// and `StoreError::Unavailable` on backend failure. Implementations own any
/// locking needed at the store boundary; all methods may be called
/// concurrently.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the entity with exactly this URL.
    async fn find_entity(&self, url: &CharmUrl, fields: &FieldSet) -> CharmStoreResult<Entity>;

    /// Find the base entity for `url`. Implementations key on `url.base()`.
    async fn find_base_entity(
        &self,
        url: &CharmUrl,
        fields: &FieldSet,
    ) -> CharmStoreResult<BaseEntity>;

    /// Find many entities in one round trip.
    ///
    /// URLs with no matching entity are absent from the result; only a
    /// backend failure is an error. The default implementation falls back to
    /// one call per URL and should be overridden by real backends.
    async fn find_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<Entity>> {
        let mut found = Vec::with_capacity(urls.len());
        for url in urls {
            match self.find_entity(url, fields).await {
                Ok(entity) => found.push(entity),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Find many base entities in one round trip. `urls` are base URLs.
    async fn find_base_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<BaseEntity>> {
        let mut found = Vec::with_capacity(urls.len());
        for url in urls {
            match self.find_base_entity(url, fields).await {
                Ok(base) => found.push(base),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}
