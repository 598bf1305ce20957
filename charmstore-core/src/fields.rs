//! Field sets: named storage projections.
//!
//! A [`FieldSet`] names the document fields a caller needs populated. The
//! identity field (`url`) is implicit: it is always populated and never
//! listed. Field interest only grows; there is deliberately no removal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Field names for [`Entity`](crate::Entity) projections.
pub mod entity {
    pub const BASE_URL: &str = "baseurl";
    pub const BLOB_HASH: &str = "blobhash";
    pub const BLOB_NAME: &str = "blobname";
    pub const SIZE: &str = "size";
    pub const UPLOAD_TIME: &str = "uploadtime";
    pub const PROMULGATED_URL: &str = "promulgated-url";
    pub const META: &str = "meta";

    /// Every projectable entity field.
    pub const ALL: &[&str] = &[
        BASE_URL,
        BLOB_HASH,
        BLOB_NAME,
        SIZE,
        UPLOAD_TIME,
        PROMULGATED_URL,
        META,
    ];
}

/// Field names for [`BaseEntity`](crate::BaseEntity) projections.
pub mod base {
    pub const NAME: &str = "name";
    pub const PROMULGATED: &str = "promulgated";
    pub const ACLS: &str = "acls";

    /// Every projectable base entity field.
    pub const ALL: &[&str] = &[NAME, PROMULGATED, ACLS];
}

/// A set of projection field names.
///
/// Union is commutative, associative and idempotent. The empty set means
/// "whatever is already available"; a non-empty set is a hard requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: BTreeSet<String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Returns true if every field in `self` is also in `other`.
    pub fn is_subset_of(&self, other: &FieldSet) -> bool {
        self.fields.is_subset(&other.fields)
    }

    /// Pure union of two sets.
    pub fn union(&self, other: &FieldSet) -> FieldSet {
        let mut merged = self.clone();
        merged.extend_from(other);
        merged
    }

    /// In-place union.
    pub fn extend_from(&mut self, other: &FieldSet) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// Fields in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&[&str]> for FieldSet {
    fn from(fields: &[&str]) -> Self {
        fields.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for FieldSet {
    fn from(fields: [&str; N]) -> Self {
        fields.into_iter().collect()
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(field)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_subset_of_everything() {
        let empty = FieldSet::new();
        assert!(empty.is_empty());
        assert!(empty.is_subset_of(&FieldSet::new()));
        assert!(empty.is_subset_of(&FieldSet::from([entity::SIZE])));
    }

    #[test]
    fn test_union_and_contains() {
        let a = FieldSet::from([entity::SIZE, entity::BLOB_NAME]);
        let b = FieldSet::from([entity::META]);
        let u = a.union(&b);
        assert_eq!(u.len(), 3);
        assert!(u.contains(entity::META));
        assert!(a.is_subset_of(&u));
        assert!(!u.is_subset_of(&a));
        // inputs untouched
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_display_and_serde_sorted() {
        let set = FieldSet::from([entity::SIZE, entity::BLOB_HASH]);
        assert_eq!(set.to_string(), "{blobhash, size}");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["blobhash","size"]"#);
        let back: FieldSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_all_constants_are_distinct() {
        assert_eq!(FieldSet::from(entity::ALL).len(), entity::ALL.len());
        assert_eq!(FieldSet::from(base::ALL).len(), base::ALL.len());
    }

    fn arb_fields() -> impl Strategy<Value = FieldSet> {
        proptest::collection::btree_set("[a-e]", 0..5).prop_map(|s| s.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_union_commutative(a in arb_fields(), b in arb_fields()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn prop_union_associative(a in arb_fields(), b in arb_fields(), c in arb_fields()) {
            prop_assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        }

        #[test]
        fn prop_union_idempotent(a in arb_fields()) {
            prop_assert_eq!(a.union(&a), a.clone());
        }

        #[test]
        fn prop_union_is_upper_bound(a in arb_fields(), b in arb_fields()) {
            let u = a.union(&b);
            prop_assert!(a.is_subset_of(&u));
            prop_assert!(b.is_subset_of(&u));
        }
    }
}
