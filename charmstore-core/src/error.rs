//! Error types for charm store operations

use crate::{CharmUrl, DocumentKind};
use thiserror::Error;

/// Document store errors.
///
/// These are produced by [`DocumentStore`](../charmstore_storage/trait.DocumentStore.html)
/// adapters and passed through the entity cache unchanged. They are `Clone`
/// so a single failed fetch can be replayed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {url}")]
    NotFound { kind: DocumentKind, url: CharmUrl },

    #[error("Document store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Fetch of {kind} {url} was cancelled before completing")]
    FetchCancelled { kind: DocumentKind, url: CharmUrl },
}

/// Charm URL parse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Empty charm URL")]
    Empty,

    #[error("Charm URL has unsupported schema in {url:?}")]
    InvalidSchema { url: String },

    #[error("Invalid owner {owner:?} in charm URL {url:?}")]
    InvalidOwner { url: String, owner: String },

    #[error("Invalid name {name:?} in charm URL {url:?}")]
    InvalidName { url: String, name: String },

    #[error("Invalid series {series:?} in charm URL {url:?}")]
    InvalidSeries { url: String, series: String },

    #[error("Invalid revision in charm URL {url:?}")]
    InvalidRevision { url: String },

    #[error("Charm URL has too many parts: {url:?}")]
    TooManyParts { url: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all charm store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CharmStoreError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CharmStoreError {
    /// Returns true if no document exists for the requested URL.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }

    /// Returns true if the backing store failed to answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }

    /// Returns true if the fetch producing this error was dropped mid-flight.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Store(StoreError::FetchCancelled { .. }))
    }
}

/// Result type alias for charm store operations.
pub type CharmStoreResult<T> = Result<T, CharmStoreError>;

// =============================================================================
// TESTS
// =============================================================================
