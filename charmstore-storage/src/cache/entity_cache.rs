//! Request-scoped entity cache.
//!
//! Memoizes entity and base entity lookups for the lifetime of one logical
//! request. Concurrent lookups of the same URL share a single store round
//! trip, and a lookup needing more fields than an entry holds replaces that
//! entry with a fetch of the union.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use charmstore_core::{
    BaseEntity, CacheConfig, CharmStoreError, CharmStoreResult, CharmUrl, DocumentKind, Entity,
    FieldSet, StoreError,
};
use futures_util::stream::{self, StreamExt};

use super::entry::{CacheEntry, CancelOnDrop, EntrySnapshot, EntryState, Outcome};
use super::stats::{CacheStats, Counters};
use crate::store::DocumentStore;

// ============================================================================
// INTERNAL STATE
// ============================================================================

/// Entries and default fields for one document kind.
struct Table<T> {
    defaults: FieldSet,
    entries: HashMap<CharmUrl, Arc<CacheEntry<T>>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            defaults: FieldSet::new(),
            entries: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entities: Table<Entity>,
    base_entities: Table<BaseEntity>,
}

/// Document kinds the cache can hold.
trait Cached: Send + Sync + Sized + 'static {
    const KIND: DocumentKind;

    fn table(state: &mut CacheState) -> &mut Table<Self>;

    /// Key the document is cached under.
    fn key(&self) -> &CharmUrl;
}

impl Cached for Entity {
    const KIND: DocumentKind = DocumentKind::Entity;

    fn table(state: &mut CacheState) -> &mut Table<Self> {
        &mut state.entities
    }

    fn key(&self) -> &CharmUrl {
        &self.url
    }
}

impl Cached for BaseEntity {
    const KIND: DocumentKind = DocumentKind::BaseEntity;

    fn table(state: &mut CacheState) -> &mut Table<Self> {
        &mut state.base_entities
    }

    fn key(&self) -> &CharmUrl {
        &self.url
    }
}

/// What a single lookup must do, decided under the lock.
enum Claim<T> {
    Hit(Arc<CacheEntry<T>>),
    Wait(Arc<CacheEntry<T>>),
    Fetch(Arc<CacheEntry<T>>),
}

/// Pending entries that share one batched store call.
struct Batch<T> {
    fields: FieldSet,
    entries: Vec<Arc<CacheEntry<T>>>,
}

impl<T> Batch<T> {
    fn split(self, size: usize) -> Vec<Batch<T>> {
        self.entries
            .chunks(size)
            .map(|chunk| Batch {
                fields: self.fields.clone(),
                entries: chunk.to_vec(),
            })
            .collect()
    }
}

// ============================================================================
// ENTITY CACHE
// ============================================================================

/// Per-request memoization layer over a [`DocumentStore`].
///
/// Create one per logical request and share it by reference (or `Arc`)
/// between the tasks serving that request. Entries are never evicted.
///
/// # Field sets
///
/// Every lookup needs `union(fields, declared defaults)`. An entry whose
/// fetched fields cover that need is served as is, including a cached
/// failure. Otherwise one fresh fetch is made with the union of the entry's
/// fields and the need, and it replaces the entry.
///
/// # Example
///
/// ```ignore
/// let cache = EntityCache::new(store);
/// cache.declare_entity_fields(&FieldSet::from([fields::entity::SIZE]));
/// let entity = cache.entity(&url, &FieldSet::new()).await?;
/// let base = cache.base_entity(&url, &FieldSet::from([fields::base::ACLS])).await?;
/// ```
pub struct EntityCache<S: DocumentStore> {
    store: Arc<S>,
    config: CacheConfig,
    state: Mutex<CacheState>,
    counters: Counters,
}

impl<S: DocumentStore> EntityCache<S> {
    /// Create a cache over `store` with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: CacheConfig::default(),
            state: Mutex::new(CacheState::default()),
            counters: Counters::default(),
        }
    }

    /// Create a cache with an explicit, validated configuration.
    pub fn with_config(store: Arc<S>, config: CacheConfig) -> CharmStoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(store)
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Default fields
    // ------------------------------------------------------------------------

    /// Add `fields` to the set fetched for every entity.
    ///
    /// Entries fetched without these fields are refetched on their next
    /// lookup.
    pub fn declare_entity_fields(&self, fields: &FieldSet) {
        self.lock().entities.defaults.extend_from(fields);
    }

    /// Add `fields` to the set fetched for every base entity.
    pub fn declare_base_entity_fields(&self, fields: &FieldSet) {
        self.lock().base_entities.defaults.extend_from(fields);
    }

    /// Current default entity fields.
    pub fn entity_fields(&self) -> FieldSet {
        self.lock().entities.defaults.clone()
    }

    /// Current default base entity fields.
    pub fn base_entity_fields(&self) -> FieldSet {
        self.lock().base_entities.defaults.clone()
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Get the entity with exactly this URL, with at least `fields` (plus the
    /// declared defaults) populated.
    ///
    /// Coverage is tracked by the fields requested, not by what the store
    /// returned: an entry fetched with an empty need covers only later empty
    /// needs, so a following lookup for specific fields refetches.
    pub async fn entity(&self, url: &CharmUrl, fields: &FieldSet) -> CharmStoreResult<Arc<Entity>> {
        let store = &self.store;
        self.lookup(url, fields, |need| async move {
            store.find_entity(url, &need).await
        })
        .await
    }

    /// Get the base entity for `url`. Series and revision are ignored.
    pub async fn base_entity(
        &self,
        url: &CharmUrl,
        fields: &FieldSet,
    ) -> CharmStoreResult<Arc<BaseEntity>> {
        let base = url.base();
        let base_ref = &base;
        let store = &self.store;
        self.lookup(base_ref, fields, |need| async move {
            store.find_base_entity(base_ref, &need).await
        })
        .await
    }

    /// Fetch many entities up front, one store call per distinct field set.
    ///
    /// Every URL not already covered ends up `Ready` or `Failed` before this
    /// returns, so later [`entity`](Self::entity) calls with no more than
    /// `fields` are cache hits. URLs the store does not have are cached as
    /// not found. Returns the first batch failure, if any.
    pub async fn prefetch_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<()> {
        let batches = self.claim_batch::<Entity>(urls.iter().cloned(), fields);
        let store = &self.store;
        self.run_batches(batches, |urls: Vec<CharmUrl>, need: FieldSet| async move {
            store.find_entities(&urls, &need).await
        })
        .await
    }

    /// Base entity analogue of [`prefetch_entities`](Self::prefetch_entities).
    pub async fn prefetch_base_entities(
        &self,
        urls: &[CharmUrl],
        fields: &FieldSet,
    ) -> CharmStoreResult<()> {
        let batches = self.claim_batch::<BaseEntity>(urls.iter().map(CharmUrl::base), fields);
        let store = &self.store;
        self.run_batches(batches, |urls: Vec<CharmUrl>, need: FieldSet| async move {
            store.find_base_entities(&urls, &need).await
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// State and fetched fields of the entity entry for `url`, if any.
    pub fn entity_snapshot(&self, url: &CharmUrl) -> Option<EntrySnapshot> {
        self.lock().entities.entries.get(url).map(|e| e.snapshot())
    }

    /// State and fetched fields of the base entity entry for `url`, if any.
    pub fn base_entity_snapshot(&self, url: &CharmUrl) -> Option<EntrySnapshot> {
        self.lock()
            .base_entities
            .entries
            .get(&url.base())
            .map(|e| e.snapshot())
    }

    /// Usage statistics so far.
    pub fn stats(&self) -> CacheStats {
        let entry_count = {
            let state = self.lock();
            state.entities.entries.len() + state.base_entities.entries.len()
        };
        self.counters.snapshot(entry_count as u64)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // State is only mutated by non-panicking map and set operations, so a
        // poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide, under the lock, whether `url` is a hit, a wait or a new fetch.
    fn claim<T: Cached>(&self, url: &CharmUrl, fields: &FieldSet) -> Claim<T> {
        let mut state = self.lock();
        let table = T::table(&mut state);
        let need = table.defaults.union(fields);

        let fetch_fields = match table.entries.get(url) {
            Some(entry) if need.is_subset_of(entry.fields()) => {
                return match entry.state() {
                    EntryState::Pending => Claim::Wait(Arc::clone(entry)),
                    EntryState::Ready | EntryState::Failed => Claim::Hit(Arc::clone(entry)),
                };
            }
            Some(entry) => entry.fields().union(&need),
            None => need,
        };

        let entry = CacheEntry::pending(T::KIND, url.clone(), fetch_fields);
        table.entries.insert(url.clone(), Arc::clone(&entry));
        Claim::Fetch(entry)
    }

    async fn lookup<T, F, Fut>(&self, url: &CharmUrl, fields: &FieldSet, fetch: F) -> Outcome<T>
    where
        T: Cached,
        F: FnOnce(FieldSet) -> Fut,
        Fut: Future<Output = CharmStoreResult<T>>,
    {
        let kind = T::KIND;
        match self.claim::<T>(url, fields) {
            Claim::Hit(entry) => {
                let outcome = entry.wait().await;
                self.counters.hit(outcome.is_err());
                tracing::trace!(%kind, %url, "Cache hit");
                outcome
            }
            Claim::Wait(entry) => {
                self.counters.wait();
                tracing::trace!(%kind, %url, fields = %entry.fields(), "Waiting on in-flight fetch");
                entry.wait().await
            }
            Claim::Fetch(entry) => {
                self.counters.miss();
                self.counters.store_call();
                let guard = CancelOnDrop::new(&*entry);
                let need = entry.fields().clone();
                tracing::debug!(%kind, %url, fields = %need, "Fetching from store");

                let outcome = fetch(need).await.map(Arc::new);
                match &outcome {
                    Ok(_) => tracing::debug!(%kind, %url, "Fetch complete"),
                    Err(e) if e.is_not_found() => tracing::debug!(%kind, %url, "Not found"),
                    Err(e) => tracing::warn!(%kind, %url, error = %e, "Fetch failed"),
                }

                entry.resolve(outcome.clone());
                drop(guard);
                outcome
            }
        }
    }

    /// Create pending entries for every URL not already covered, grouped by
    /// the field set each must be fetched with.
    fn claim_batch<T: Cached>(
        &self,
        urls: impl IntoIterator<Item = CharmUrl>,
        fields: &FieldSet,
    ) -> Vec<Batch<T>> {
        let mut state = self.lock();
        let table = T::table(&mut state);
        let need = table.defaults.union(fields);
        let mut batches: Vec<Batch<T>> = Vec::new();

        for url in urls {
            let fetch_fields = match table.entries.get(&url) {
                Some(entry) if need.is_subset_of(entry.fields()) => continue,
                Some(entry) => entry.fields().union(&need),
                None => need.clone(),
            };
            let entry = CacheEntry::pending(T::KIND, url.clone(), fetch_fields);
            table.entries.insert(url, Arc::clone(&entry));

            match batches.iter_mut().find(|b| &b.fields == entry.fields()) {
                Some(batch) => batch.entries.push(entry),
                None => batches.push(Batch {
                    fields: entry.fields().clone(),
                    entries: vec![entry],
                }),
            }
        }

        match self.config.prefetch_batch_size {
            Some(size) => batches.into_iter().flat_map(|b| b.split(size)).collect(),
            None => batches,
        }
    }

    async fn run_batches<T, F, Fut>(&self, batches: Vec<Batch<T>>, fetch: F) -> CharmStoreResult<()>
    where
        T: Cached,
        F: Fn(Vec<CharmUrl>, FieldSet) -> Fut,
        Fut: Future<Output = CharmStoreResult<Vec<T>>>,
    {
        if batches.is_empty() {
            return Ok(());
        }
        // Batches still queued behind the concurrency limit are not polled
        // yet, so every claimed entry is guarded here rather than per batch.
        let claimed: Vec<Arc<CacheEntry<T>>> = batches
            .iter()
            .flat_map(|batch| batch.entries.iter().cloned())
            .collect();
        let _guards: Vec<CancelOnDrop<'_, T>> = claimed
            .iter()
            .map(|entry| CancelOnDrop::new(&**entry))
            .collect();

        let fetch = &fetch;
        let results: Vec<CharmStoreResult<()>> = stream::iter(batches)
            .map(|batch| self.fetch_batch(batch, fetch))
            .buffer_unordered(self.config.max_concurrent_batches)
            .collect()
            .await;
        results.into_iter().collect()
    }

    async fn fetch_batch<T, F, Fut>(&self, batch: Batch<T>, fetch: &F) -> CharmStoreResult<()>
    where
        T: Cached,
        F: Fn(Vec<CharmUrl>, FieldSet) -> Fut,
        Fut: Future<Output = CharmStoreResult<Vec<T>>>,
    {
        let kind = T::KIND;
        let urls: Vec<CharmUrl> = batch.entries.iter().map(|e| e.url().clone()).collect();

        self.counters.store_call();
        tracing::debug!(%kind, count = urls.len(), fields = %batch.fields, "Prefetching batch");

        match fetch(urls, batch.fields.clone()).await {
            Ok(docs) => {
                let mut found: HashMap<CharmUrl, T> =
                    docs.into_iter().map(|d| (d.key().clone(), d)).collect();
                for entry in &batch.entries {
                    let outcome = match found.remove(entry.url()) {
                        Some(doc) => Ok(Arc::new(doc)),
                        None => Err(CharmStoreError::Store(StoreError::NotFound {
                            kind,
                            url: entry.url().clone(),
                        })),
                    };
                    entry.resolve(outcome);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    %kind,
                    count = batch.entries.len(),
                    error = %e,
                    "Prefetch batch failed"
                );
                for entry in &batch.entries {
                    entry.resolve(Err(e.clone()));
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
