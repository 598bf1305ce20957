//! Identity helpers for stored blobs

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha384};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Compute the hex-encoded SHA-384 hash the store uses to address archives.
pub fn compute_blob_hash(content: &[u8]) -> String {
    let mut hasher = Sha384::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
