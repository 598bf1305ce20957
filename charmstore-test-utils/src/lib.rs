//! Charm Store Test Utilities
//!
//! Centralized test infrastructure for the charm store workspace:
//! - Fixtures for common scenarios (the `~bob/wordpress` store)
//! - A gated store wrapper for deterministic concurrency tests
//! - Proptest generators for URLs and field sets
//! - Tracing setup for test output

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{watch, Semaphore};

// Re-export the in-memory store from its source crate
pub use charmstore_storage::{
    DocumentStore, EntityCache, EntrySnapshot, EntryState, InMemoryDocumentStore, StoreCall,
};

// Re-export core types for convenience
pub use charmstore_core::{
    fields, Acl, BaseEntity, CacheConfig, CharmStoreError, CharmStoreResult, CharmUrl,
    DocumentKind, Entity, FieldSet, StoreError, compute_blob_hash,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Parse a charm URL, panicking on malformed input.
pub fn charm_url(s: &str) -> CharmUrl {
    s.parse()
        .unwrap_or_else(|e| panic!("invalid fixture URL {:?}: {}", s, e))
}

/// A fully populated entity for `url`.
pub fn make_entity(url: &str) -> Entity {
    let url = charm_url(url);
    let archive = format!("archive for {}", url);
    Entity {
        base_url: Some(url.base()),
        blob_hash: Some(compute_blob_hash(archive.as_bytes())),
        blob_name: Some(format!("{}-{}", url.name(), url.revision().max(0))),
        size: Some(archive.len() as u64),
        upload_time: Some(Utc.with_ymd_and_hms(2016, 3, 1, 12, 0, 0).unwrap()),
        promulgated_url: Some(CharmUrl::new(url.name()).with_revision(url.revision())),
        meta: Some(serde_json::json!({
            "name": url.name(),
            "summary": format!("The {} charm", url.name()),
            "resources": {
                "data": {"type": "file", "filename": "data.tgz"}
            }
        })),
        url,
    }
}

/// A fully populated base entity for the base of `url`.
pub fn make_base_entity(url: &str) -> BaseEntity {
    let url = charm_url(url).base();
    let owner = url.owner().unwrap_or("charmers").to_string();
    BaseEntity {
        name: Some(url.name().to_string()),
        promulgated: Some(url.owner().is_none()),
        acls: Some(Acl {
            read: vec!["everyone".to_string(), owner.clone()],
            write: vec![owner],
        }),
        url,
    }
}

/// Store holding `~bob/wordpress-1`, `~bob/wordpress-2`, `~bob/mysql-5`
/// and the base entities `~bob/wordpress` and `~bob/mysql`.
pub fn wordpress_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    for url in ["~bob/wordpress-1", "~bob/wordpress-2", "~bob/mysql-5"] {
        store.insert_entity(make_entity(url));
    }
    for url in ["~bob/wordpress", "~bob/mysql"] {
        store.insert_base_entity(make_base_entity(url));
    }
    store
}

// ============================================================================
// GATED STORE
// ============================================================================

/// Store wrapper that holds every call at a gate until released.
///
/// Each call is counted on entry, then blocks until a permit is available
/// or the gate is opened. Lets tests line up concurrent callers behind a
/// known in-flight fetch.
pub struct GatedStore<S> {
    inner: S,
    gate: Semaphore,
    entered: watch::Sender<usize>,
}

impl<S: DocumentStore> GatedStore<S> {
    /// Wrap `inner` with a closed gate.
    pub fn new(inner: S) -> Self {
        let (entered, _) = watch::channel(0);
        Self {
            inner,
            gate: Semaphore::new(0),
            entered,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Let `n` more calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Let every current and future call through.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Number of calls that have reached the gate.
    pub fn entered(&self) -> usize {
        *self.entered.borrow()
    }

    /// Wait until at least `n` calls have reached the gate.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.entered.subscribe();
        // The sender is owned by `self`, so the channel stays open.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    async fn pass(&self) {
        self.entered.send_modify(|count| *count += 1);
        // A closed semaphore means the gate is open.
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for GatedStore<S> {
    async fn find_entity(&self, url: &CharmUrl, fields: &FieldSet) -> CharmStoreResult<Entity> {
        self.pass().await;
        self.inner.find_entity(url, fields).await
    }

    async fn find_base_entity(
        &self,
        url: &CharmUrl,
        fields: &FieldSet,
    ) -> CharmStoreResult<BaseEntity> {
        self.pass().await;
        self.inner.find_base_entity(url, fields).await
    }

    async fn find_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<Entity>> {
        self.pass().await;
        self.inner.find_entities(urls, fields).await
    }

    async fn find_base_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<Vec<BaseEntity>> {
        self.pass().await;
        self.inner.find_base_entities(urls, fields).await
    }
}

/// Entity cache over a gated wordpress store, plus a handle on the gate.
pub fn gated_wordpress_cache() -> (
    Arc<EntityCache<GatedStore<InMemoryDocumentStore>>>,
    Arc<GatedStore<InMemoryDocumentStore>>,
) {
    let store = Arc::new(GatedStore::new(wordpress_store()));
    let cache = Arc::new(EntityCache::new(Arc::clone(&store)));
    (cache, store)
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Proptest generators for charm store types.
pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Valid charm URLs with optional owner, series and revision.
    pub fn arb_charm_url() -> impl Strategy<Value = CharmUrl> {
        (
            proptest::option::of("[a-z][a-z0-9]{0,6}"),
            "[a-z][a-z0-9]{0,8}",
            proptest::option::of(prop_oneof![
                Just("trusty"),
                Just("xenial"),
                Just("bionic")
            ]),
            -1i32..50,
        )
            .prop_map(|(owner, name, series, revision)| {
                let mut url = CharmUrl::new(name).with_revision(revision);
                if let Some(owner) = owner {
                    url = url.with_owner(owner);
                }
                if let Some(series) = series {
                    url = url.with_series(series);
                }
                url
            })
    }

    /// Subsets of the entity projection fields.
    pub fn arb_entity_fields() -> impl Strategy<Value = FieldSet> {
        proptest::sample::subsequence(fields::entity::ALL.to_vec(), 0..=fields::entity::ALL.len())
            .prop_map(|names| names.into_iter().collect())
    }

    /// Subsets of the base entity projection fields.
    pub fn arb_base_fields() -> impl Strategy<Value = FieldSet> {
        proptest::sample::subsequence(fields::base::ALL.to_vec(), 0..=fields::base::ALL.len())
            .prop_map(|names| names.into_iter().collect())
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber filtered by `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
