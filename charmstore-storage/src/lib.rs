//! Charm Store Storage - Document Store Trait and Entity Cache
//!
//! Defines the document store abstraction, an in-memory implementation,
//! and the request-scoped entity cache that sits between API handlers and
//! the store.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{CacheStats, EntityCache, EntrySnapshot, EntryState};
pub use memory::{InMemoryDocumentStore, StoreCall};
pub use store::DocumentStore;
