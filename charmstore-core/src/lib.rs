//! Charm Store Core - Entity Types
//!
//! Pure data structures shared by the storage and cache layers: charm URLs,
//! stored documents, field-set projections, errors and configuration.
//! This crate contains no I/O.

pub mod config;
pub mod entities;
pub mod error;
pub mod fields;
pub mod identity;
pub mod url;

pub use config::CacheConfig;
pub use entities::{Acl, BaseEntity, DocumentKind, Entity};
pub use error::{CharmStoreError, CharmStoreResult, ConfigError, StoreError, UrlError};
pub use fields::FieldSet;
pub use identity::{compute_blob_hash, Timestamp};
pub use url::{CharmUrl, NO_REVISION};
