//! In-memory document store.
//!
//! Reference [`DocumentStore`] used by tests and local tooling. It projects
//! every returned document down to the requested fields and records each
//! call so callers can assert on round-trip counts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use charmstore_core::{
    BaseEntity, CharmStoreError, CharmStoreResult, CharmUrl, DocumentKind, Entity, FieldSet,
    StoreError,
};

use crate::store::DocumentStore;

/// One recorded store round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub kind: DocumentKind,
    /// Requested URLs; one element for single lookups.
    pub urls: Vec<CharmUrl>,
    pub fields: FieldSet,
    /// Whether this was a batch (`find_entities`/`find_base_entities`) call.
    pub batched: bool,
}

/// Document store backed by hash maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    entities: Arc<RwLock<HashMap<CharmUrl, Entity>>>,
    base_entities: Arc<RwLock<HashMap<CharmUrl, BaseEntity>>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    /// When set, every call fails with `StoreError::Unavailable`.
    outage: Arc<RwLock<Option<String>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, keyed by its URL.
    pub fn insert_entity(&self, entity: Entity) {
        self.entities
            .write()
            .unwrap()
            .insert(entity.url.clone(), entity);
    }

    /// Insert or replace a base entity, keyed by its base URL.
    pub fn insert_base_entity(&self, mut base: BaseEntity) {
        base.url = base.url.base();
        self.base_entities
            .write()
            .unwrap()
            .insert(base.url.clone(), base);
    }

    /// Get count of stored entities.
    pub fn entity_count(&self) -> usize {
        self.entities.read().unwrap().len()
    }

    /// Get count of stored base entities.
    pub fn base_entity_count(&self) -> usize {
        self.base_entities.read().unwrap().len()
    }

    /// Make every subsequent call fail as unavailable (`Some`) or succeed
    /// again (`None`).
    pub fn set_outage(&self, reason: Option<&str>) {
        *self.outage.write().unwrap() = reason.map(str::to_string);
    }

    /// All calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of round trips made so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn record(&self, kind: DocumentKind, urls: &[CharmUrl], fields: &FieldSet, batched: bool) {
        self.calls.write().unwrap().push(StoreCall {
            kind,
            urls: urls.to_vec(),
            fields: fields.clone(),
            batched,
        });
    }

    fn check_available(&self) -> CharmStoreResult<()> {
        match self.outage.read().unwrap().as_ref() {
            Some(reason) => Err(CharmStoreError::Store(StoreError::Unavailable {
                reason: reason.clone(),
            })),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_entity(&self, url: &CharmUrl, fields: &FieldSet) -> CharmStoreResult<Entity> {
        self.record(DocumentKind::Entity, std::slice::from_ref(url), fields, false);
        self.check_available()?;
        let entities = self.entities.read().unwrap();
        entities
            .get(url)
            .map(|e| e.project(fields))
            .ok_or_else(|| {
                CharmStoreError::Store(StoreError::NotFound {
                    kind: DocumentKind::Entity,
                    url: url.clone(),
                })
            })
    }

    async fn find_base_entity(
        &self,
        url: &CharmUrl,
        fields: &FieldSet,
    ) -> CharmStoreResult<BaseEntity> {
        let base_url = url.base();
        self.record(
            DocumentKind::BaseEntity,
            std::slice::from_ref(&base_url),
            fields,
            false,
        );
        self.check_available()?;
        let bases = self.base_entities.read().unwrap();
        bases
            .get(&base_url)
            .map(|b| b.project(fields))
            .ok_or_else(|| {
                CharmStoreError::Store(StoreError::NotFound {
                    kind: DocumentKind::BaseEntity,
                    url: base_url.clone(),
                })
            })
    }

    async fn find_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<Entity>> {
        self.record(DocumentKind::Entity, urls, fields, true);
        self.check_available()?;
        let entities = self.entities.read().unwrap();
        Ok(urls
            .iter()
            .filter_map(|url| entities.get(url))
            .map(|e| e.project(fields))
            .collect())
    }

    async fn find_base_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<BaseEntity>> {
        self.record(DocumentKind::BaseEntity, urls, fields, true);
        self.check_available()?;
        let bases = self.base_entities.read().unwrap();
        Ok(urls
            .iter()
            .filter_map(|url| bases.get(&url.base()))
            .map(|b| b.project(fields))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charmstore_core::fields::{base, entity};
    use charmstore_core::Acl;
    use proptest::prelude::*;

    fn url(s: &str) -> CharmUrl {
        s.parse().unwrap()
    }

    fn make_test_entity(s: &str) -> Entity {
        let url = url(s);
        Entity {
            base_url: Some(url.base()),
            blob_hash: Some(charmstore_core::compute_blob_hash(s.as_bytes())),
            blob_name: Some(format!("blob-{}", url.name())),
            size: Some(4096),
            upload_time: Some(chrono::Utc::now()),
            promulgated_url: None,
            meta: Some(serde_json::json!({"summary": "test charm"})),
            url,
        }
    }

    #[tokio::test]
    async fn test_find_entity_projects_fields() {
        let store = InMemoryDocumentStore::new();
        store.insert_entity(make_test_entity("~bob/wordpress-1"));

        let fields = FieldSet::from([entity::SIZE]);
        let found = store
            .find_entity(&url("~bob/wordpress-1"), &fields)
            .await
            .unwrap();

        assert_eq!(found.size, Some(4096));
        assert!(found.blob_name.is_none());
        assert_eq!(store.call_count(), 1);
        assert_eq!(store.calls()[0].fields, fields);
        assert!(!store.calls()[0].batched);
    }

    #[tokio::test]
    async fn test_find_entity_requires_exact_url() {
        let store = InMemoryDocumentStore::new();
        store.insert_entity(make_test_entity("~bob/wordpress-1"));

        let err = store
            .find_entity(&url("~bob/wordpress-2"), &FieldSet::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_find_base_entity_normalizes_url() {
        let store = InMemoryDocumentStore::new();
        store.insert_base_entity(BaseEntity {
            url: url("~bob/wordpress"),
            name: Some("wordpress".to_string()),
            promulgated: Some(false),
            acls: Some(Acl::default()),
        });

        let found = store
            .find_base_entity(&url("~bob/trusty/wordpress-3"), &FieldSet::from([base::NAME]))
            .await
            .unwrap();
        assert_eq!(found.url, url("~bob/wordpress"));
        assert_eq!(found.name.as_deref(), Some("wordpress"));
        assert!(found.acls.is_none());
        assert_eq!(store.calls()[0].urls, vec![url("~bob/wordpress")]);
    }

    #[tokio::test]
    async fn test_batch_skips_missing() {
        let store = InMemoryDocumentStore::new();
        store.insert_entity(make_test_entity("~bob/wordpress-1"));
        store.insert_entity(make_test_entity("~bob/mysql-2"));

        let urls = vec![
            url("~bob/wordpress-1"),
            url("~alice/missing-1"),
            url("~bob/mysql-2"),
        ];
        let found = store.find_entities(&urls, &FieldSet::new()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.call_count(), 1);
        assert!(store.calls()[0].batched);
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let store = InMemoryDocumentStore::new();
        store.insert_entity(make_test_entity("~bob/wordpress-1"));
        store.set_outage(Some("mongo down"));

        let err = store
            .find_entity(&url("~bob/wordpress-1"), &FieldSet::new())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());

        let err = store
            .find_entities(&[url("~bob/wordpress-1")], &FieldSet::new())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(store.call_count(), 2);

        store.set_outage(None);
        assert!(store
            .find_entity(&url("~bob/wordpress-1"), &FieldSet::new())
            .await
            .is_ok());
    }

    fn arb_entity_fields() -> impl Strategy<Value = FieldSet> {
        proptest::sample::subsequence(entity::ALL.to_vec(), 0..=entity::ALL.len())
            .prop_map(|names| names.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Returned entities populate every requested field the stored
        /// document has.
        #[test]
        fn prop_projection_covers_request(fields in arb_entity_fields()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemoryDocumentStore::new();
            let mut stored = make_test_entity("~bob/wordpress-1");
            stored.promulgated_url = Some(url("wordpress-1"));
            store.insert_entity(stored);

            let found = rt
                .block_on(store.find_entity(&url("~bob/wordpress-1"), &fields))
                .unwrap();
            if fields.is_empty() {
                prop_assert_eq!(found.populated_fields().len(), entity::ALL.len());
            } else {
                prop_assert!(fields.is_subset_of(&found.populated_fields()));
            }
        }
    }
}
