//! Charm URL identity type

use crate::UrlError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Revision value meaning "unspecified" (resolve to latest).
pub const NO_REVISION: i32 = -1;

const SCHEMA: &str = "cs:";

/// Structured identifier for a package revision.
///
/// Textual form is `[cs:][~owner/][series/]name[-revision]`. Two URLs name the
/// same entity only if every component is equal. URLs are immutable once
/// built; the `with_*` builders return new values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharmUrl {
    owner: Option<String>,
    name: String,
    series: Option<String>,
    revision: i32,
}

impl CharmUrl {
    /// Create an unowned, unrevisioned URL for `name`.
    ///
    /// The name is not validated; use [`FromStr`] for untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            series: None,
            revision: NO_REVISION,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn with_revision(mut self, revision: i32) -> Self {
        self.revision = revision;
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn series(&self) -> Option<&str> {
        self.series.as_deref()
    }

    /// Revision number, or [`NO_REVISION`] when unspecified.
    pub fn revision(&self) -> i32 {
        self.revision
    }

    pub fn has_revision(&self) -> bool {
        self.revision >= 0
    }

    /// The package-level URL: owner and name only.
    pub fn base(&self) -> CharmUrl {
        Self {
            owner: self.owner.clone(),
            name: self.name.clone(),
            series: None,
            revision: NO_REVISION,
        }
    }

    /// Returns true if this URL carries neither series nor revision.
    pub fn is_base(&self) -> bool {
        self.series.is_none() && self.revision == NO_REVISION
    }
}

impl fmt::Display for CharmUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEMA)?;
        if let Some(owner) = &self.owner {
            write!(f, "~{}/", owner)?;
        }
        if let Some(series) = &self.series {
            write!(f, "{}/", series)?;
        }
        f.write_str(&self.name)?;
        if self.has_revision() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl FromStr for CharmUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(UrlError::Empty);
        }
        let rest = s.strip_prefix(SCHEMA).unwrap_or(s);
        if rest.contains(':') {
            return Err(UrlError::InvalidSchema { url: s.to_string() });
        }

        let mut parts: Vec<&str> = rest.split('/').collect();
        let owner = match parts.first() {
            Some(first) if first.starts_with('~') => {
                let owner = &first[1..];
                if !is_valid_owner(owner) {
                    return Err(UrlError::InvalidOwner {
                        url: s.to_string(),
                        owner: owner.to_string(),
                    });
                }
                parts.remove(0);
                Some(owner.to_string())
            }
            _ => None,
        };

        let (series, name_part) = match parts.as_slice() {
            [name] => (None, *name),
            [series, name] => {
                if !is_valid_series(series) {
                    return Err(UrlError::InvalidSeries {
                        url: s.to_string(),
                        series: series.to_string(),
                    });
                }
                (Some(series.to_string()), *name)
            }
            [] => return Err(UrlError::Empty),
            _ => return Err(UrlError::TooManyParts { url: s.to_string() }),
        };

        let (name, revision) = split_revision(s, name_part)?;
        if !is_valid_name(name) {
            return Err(UrlError::InvalidName {
                url: s.to_string(),
                name: name.to_string(),
            });
        }

        Ok(Self {
            owner,
            name: name.to_string(),
            series,
            revision,
        })
    }
}

/// Split `wordpress-12` into (`wordpress`, 12). A trailing segment that is not
/// all digits belongs to the name.
fn split_revision<'a>(url: &str, part: &'a str) -> Result<(&'a str, i32), UrlError> {
    match part.rsplit_once('-') {
        Some((name, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => {
            let revision = rev
                .parse::<i32>()
                .map_err(|_| UrlError::InvalidRevision {
                    url: url.to_string(),
                })?;
            Ok((name, revision))
        }
        _ => Ok((part, NO_REVISION)),
    }
}

/// Names are hyphen-separated lowercase segments; each segment needs a letter
/// and the first must start with one.
fn is_valid_name(name: &str) -> bool {
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return false;
    }
    name.split('-').all(|seg| {
        !seg.is_empty()
            && seg
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            && seg.chars().any(|c| c.is_ascii_lowercase())
    })
}

fn is_valid_owner(owner: &str) -> bool {
    owner.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
}

fn is_valid_series(series: &str) -> bool {
    series.starts_with(|c: char| c.is_ascii_lowercase())
        && series
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

impl Serialize for CharmUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CharmUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
