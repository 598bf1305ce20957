//! Stored document types: entities and base entities.
//!
//! Every field except the identifying URL is optional. A document fetched
//! with a limited projection leaves unrequested fields as `None`.

use crate::fields::{base, entity};
use crate::{CharmUrl, FieldSet, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of document a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Entity,
    BaseEntity,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::BaseEntity => f.write_str("base entity"),
        }
    }
}

/// Metadata for one package revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Fully qualified URL; always populated.
    pub url: CharmUrl,
    pub base_url: Option<CharmUrl>,
    /// Hex-encoded SHA-384 of the archive.
    pub blob_hash: Option<String>,
    pub blob_name: Option<String>,
    pub size: Option<u64>,
    pub upload_time: Option<Timestamp>,
    pub promulgated_url: Option<CharmUrl>,
    /// Package manifest, including declared resources.
    pub meta: Option<serde_json::Value>,
}

impl Entity {
    /// An entity with only its identity populated.
    pub fn new(url: CharmUrl) -> Self {
        Self {
            url,
            base_url: None,
            blob_hash: None,
            blob_name: None,
            size: None,
            upload_time: None,
            promulgated_url: None,
            meta: None,
        }
    }

    /// Copy of this entity with only `fields` (plus identity) populated.
    ///
    /// An empty field set keeps everything.
    pub fn project(&self, fields: &FieldSet) -> Entity {
        if fields.is_empty() {
            return self.clone();
        }
        let keep = |name: &str| fields.contains(name);
        Entity {
            url: self.url.clone(),
            base_url: self.base_url.clone().filter(|_| keep(entity::BASE_URL)),
            blob_hash: self.blob_hash.clone().filter(|_| keep(entity::BLOB_HASH)),
            blob_name: self.blob_name.clone().filter(|_| keep(entity::BLOB_NAME)),
            size: self.size.filter(|_| keep(entity::SIZE)),
            upload_time: self.upload_time.filter(|_| keep(entity::UPLOAD_TIME)),
            promulgated_url: self
                .promulgated_url
                .clone()
                .filter(|_| keep(entity::PROMULGATED_URL)),
            meta: self.meta.clone().filter(|_| keep(entity::META)),
        }
    }

    /// Names of the fields that currently hold a value.
    pub fn populated_fields(&self) -> FieldSet {
        let present = [
            (entity::BASE_URL, self.base_url.is_some()),
            (entity::BLOB_HASH, self.blob_hash.is_some()),
            (entity::BLOB_NAME, self.blob_name.is_some()),
            (entity::SIZE, self.size.is_some()),
            (entity::UPLOAD_TIME, self.upload_time.is_some()),
            (entity::PROMULGATED_URL, self.promulgated_url.is_some()),
            (entity::META, self.meta.is_some()),
        ];
        present
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Read and write principal lists for a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

/// Package-level aggregate metadata, keyed by base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEntity {
    /// Base URL (owner and name only); always populated.
    pub url: CharmUrl,
    pub name: Option<String>,
    pub promulgated: Option<bool>,
    pub acls: Option<Acl>,
}

impl BaseEntity {
    /// A base entity with only its identity populated. `url` is reduced to
    /// its base form.
    pub fn new(url: &CharmUrl) -> Self {
        Self {
            url: url.base(),
            name: None,
            promulgated: None,
            acls: None,
        }
    }

    /// Copy with only `fields` (plus identity) populated; empty keeps all.
    pub fn project(&self, fields: &FieldSet) -> BaseEntity {
        if fields.is_empty() {
            return self.clone();
        }
        BaseEntity {
            url: self.url.clone(),
            name: self.name.clone().filter(|_| fields.contains(base::NAME)),
            promulgated: self.promulgated.filter(|_| fields.contains(base::PROMULGATED)),
            acls: self.acls.clone().filter(|_| fields.contains(base::ACLS)),
        }
    }

    pub fn populated_fields(&self) -> FieldSet {
        let mut names = Vec::new();
        if self.name.is_some() {
            names.push(base::NAME);
        }
        if self.promulgated.is_some() {
            names.push(base::PROMULGATED);
        }
        if self.acls.is_some() {
            names.push(base::ACLS);
        }
        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn full_entity() -> Entity {
        let url: CharmUrl = "~bob/trusty/wordpress-1".parse().unwrap();
        Entity {
            base_url: Some(url.base()),
            blob_hash: Some("abc".to_string()),
            blob_name: Some("blob-1".to_string()),
            size: Some(1024),
            upload_time: Some(Utc::now()),
            promulgated_url: None,
            meta: Some(serde_json::json!({"resources": {}})),
            url,
        }
    }

    #[test]
    fn test_entity_projection_keeps_requested_fields() {
        let e = full_entity();
        let projected = e.project(&FieldSet::from([entity::SIZE, entity::BLOB_NAME]));
        assert_eq!(projected.url, e.url);
        assert_eq!(projected.size, Some(1024));
        assert_eq!(projected.blob_name.as_deref(), Some("blob-1"));
        assert!(projected.blob_hash.is_none());
        assert!(projected.meta.is_none());
        assert_eq!(
            projected.populated_fields(),
            FieldSet::from([entity::SIZE, entity::BLOB_NAME])
        );
    }

    #[test]
    fn test_empty_projection_keeps_everything() {
        let e = full_entity();
        assert_eq!(e.project(&FieldSet::new()), e);
    }

    #[test]
    fn test_base_entity_new_reduces_url() {
        let url: CharmUrl = "~bob/xenial/wordpress-4".parse().unwrap();
        let b = BaseEntity::new(&url);
        assert!(b.url.is_base());
        assert!(b.populated_fields().is_empty());
    }

    #[test]
    fn test_base_entity_projection() {
        let b = BaseEntity {
            url: "~bob/wordpress".parse().unwrap(),
            name: Some("wordpress".to_string()),
            promulgated: Some(true),
            acls: Some(Acl {
                read: vec!["everyone".to_string()],
                write: vec!["bob".to_string()],
            }),
        };
        let projected = b.project(&FieldSet::from([base::ACLS]));
        assert!(projected.name.is_none());
        assert!(projected.promulgated.is_none());
        assert_eq!(projected.acls, b.acls);
        assert_eq!(projected.populated_fields(), FieldSet::from([base::ACLS]));
    }

    #[test]
    fn test_document_kind_display() {
        assert_eq!(DocumentKind::Entity.to_string(), "entity");
        assert_eq!(DocumentKind::BaseEntity.to_string(), "base entity");
    }
}
