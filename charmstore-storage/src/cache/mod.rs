//! Request-scoped entity cache.
//!
//! This module memoizes entity and base entity lookups for one logical
//! request, so that handlers asking for overlapping field sets across many
//! packages converge on the minimum number of store round trips.
//!
//! # Entry lifecycle
//!
//! | State | Meaning |
//! |-------|---------|
//! | Pending | A fetch is in flight; later callers wait on it |
//! | Ready | Document available; served to any request it covers |
//! | Failed | Error cached; replayed to any request it covers |
//!
//! An entry that does not cover a request is replaced by a fresh fetch of
//! the union of its fields and the request. Entries are never evicted; the
//! cache is dropped with the request.
//!
//! # Example
//!
//! ```ignore
//! let cache = EntityCache::new(store);
//! cache.declare_entity_fields(&FieldSet::from([fields::entity::BLOB_NAME]));
//! cache.prefetch_entities(&result_urls, &FieldSet::new()).await?;
//! for url in &result_urls {
//!     let entity = cache.entity(url, &FieldSet::new()).await?;
//! }
//! ```

pub mod entity_cache;
pub mod entry;
pub mod stats;

pub use entity_cache::EntityCache;
pub use entry::{EntrySnapshot, EntryState};
pub use stats::CacheStats;
