//! Core data models.
//!
//! [`RawSourceEntry`] is what an upstream snapshot file contains; several
//! raw entries may describe the same skill. [`CanonicalSkillRecord`] is the
//! deduplicated unit of storage and retrieval.

use serde::{Deserialize, Serialize};

use crate::coerce::LooseValue;

/// Provenance tags of the three upstream platforms.
pub const KNOWN_SOURCES: [&str; 3] = ["skillsmp", "skillsh", "clawhub"];

/// One entry from a per-source snapshot. Only `id` is required; every
/// field is kept loose until normalization coerces it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSourceEntry {
    pub id: Option<LooseValue>,
    pub name: Option<LooseValue>,
    pub description: Option<LooseValue>,
    pub owner: Option<LooseValue>,
    pub repo: Option<LooseValue>,
    pub skill_name: Option<LooseValue>,
    pub skill_path: Option<LooseValue>,
    pub github_url: Option<LooseValue>,
    pub skill_url: Option<LooseValue>,
    pub installs: Option<LooseValue>,
    pub license: Option<LooseValue>,
    pub version: Option<LooseValue>,
    pub published_at: Option<LooseValue>,
    pub category: Option<LooseValue>,
    pub quality_score: Option<LooseValue>,
    /// Provenance list (array or comma string).
    pub sources: Option<LooseValue>,
    /// Single provenance tag, used when `sources` is absent.
    pub source: Option<LooseValue>,
    pub tags: Option<LooseValue>,
    pub body_length: Option<LooseValue>,
    pub file_size: Option<LooseValue>,
}

/// The authoritative record for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSkillRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub skill_name: Option<String>,
    pub skill_path: Option<String>,
    pub github_url: Option<String>,
    pub skill_url: Option<String>,
    /// Ordered, de-duplicated provenance tags; never empty once persisted.
    pub sources: Vec<String>,
    pub installs: i64,
    pub license: Option<String>,
    pub version: Option<String>,
    /// Epoch milliseconds.
    pub published_at: Option<i64>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub body_length: Option<i64>,
    pub file_size: Option<i64>,
    pub quality_score: Option<f64>,
}

impl CanonicalSkillRecord {
    /// A record with only the required fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            owner: None,
            repo: None,
            skill_name: None,
            skill_path: None,
            github_url: None,
            skill_url: None,
            sources: Vec::new(),
            installs: 0,
            license: None,
            version: None,
            published_at: None,
            category: None,
            tags: None,
            body_length: None,
            file_size: None,
            quality_score: None,
        }
    }

    pub fn has_description(&self) -> bool {
        is_present(&self.description)
    }

    pub fn has_category(&self) -> bool {
        is_present(&self.category)
    }

    pub fn has_tags(&self) -> bool {
        self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// `Some` and not blank.
pub(crate) fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
