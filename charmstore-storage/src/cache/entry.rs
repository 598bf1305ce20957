//! Cache entries and their completion signalling.
//!
//! An entry is created `Pending` by the caller that will perform the fetch.
//! It resolves exactly once, to `Ready` or `Failed`, and never changes
//! afterwards. Waiters subscribe to a `watch` channel owned by the entry.

use std::sync::Arc;

use charmstore_core::{CharmStoreError, CharmStoreResult, CharmUrl, DocumentKind, FieldSet, StoreError};
use tokio::sync::watch;

/// Result of a fetch as shared with every caller.
pub(crate) type Outcome<T> = CharmStoreResult<Arc<T>>;

/// Completion state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Ready,
    Failed,
}

/// Point-in-time view of an entry, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub state: EntryState,
    /// Fields the entry was (or is being) fetched with.
    pub fields: FieldSet,
}

pub(crate) struct CacheEntry<T> {
    kind: DocumentKind,
    url: CharmUrl,
    fields: FieldSet,
    outcome: watch::Sender<Option<Outcome<T>>>,
}

impl<T> CacheEntry<T> {
    pub(crate) fn pending(kind: DocumentKind, url: CharmUrl, fields: FieldSet) -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self {
            kind,
            url,
            fields,
            outcome,
        })
    }

    pub(crate) fn url(&self) -> &CharmUrl {
        &self.url
    }

    pub(crate) fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub(crate) fn state(&self) -> EntryState {
        match &*self.outcome.borrow() {
            None => EntryState::Pending,
            Some(Ok(_)) => EntryState::Ready,
            Some(Err(_)) => EntryState::Failed,
        }
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            state: self.state(),
            fields: self.fields.clone(),
        }
    }

    /// Resolve the entry. Returns false if it was already resolved, in which
    /// case the first outcome stands.
    pub(crate) fn resolve(&self, outcome: Outcome<T>) -> bool {
        let mut outcome = Some(outcome);
        self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = outcome.take();
            true
        })
    }

    /// Resolve as cancelled if nothing else has resolved it yet.
    pub(crate) fn cancel(&self) -> bool {
        self.resolve(Err(self.cancelled_error()))
    }

    /// The resolved outcome, if any.
    pub(crate) fn outcome(&self) -> Option<Outcome<T>> {
        (*self.outcome.borrow()).clone()
    }

    /// Wait until the entry resolves and return its outcome.
    pub(crate) async fn wait(&self) -> Outcome<T> {
        let mut rx = self.outcome.subscribe();
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|slot| (*slot).clone());
        // The sender lives as long as `self`, so the channel cannot close
        // while we hold a reference.
        resolved.unwrap_or_else(|| Err(self.cancelled_error()))
    }

    fn cancelled_error(&self) -> CharmStoreError {
        CharmStoreError::Store(StoreError::FetchCancelled {
            kind: self.kind,
            url: self.url.clone(),
        })
    }
}

/// Marks an entry cancelled if dropped before the fetch resolved it.
///
/// Held by whoever runs the store call, so a fetch future dropped mid-flight
/// still releases its waiters.
pub(crate) struct CancelOnDrop<'a, T> {
    entry: &'a CacheEntry<T>,
}

impl<'a, T> CancelOnDrop<'a, T> {
    pub(crate) fn new(entry: &'a CacheEntry<T>) -> Self {
        Self { entry }
    }
}

impl<T> Drop for CancelOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.entry.cancel() {
            tracing::warn!(
                kind = %self.entry.kind,
                url = %self.entry.url,
                "Fetch dropped before completion; entry marked failed"
            );
        }
    }
}
