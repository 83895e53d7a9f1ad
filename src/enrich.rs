//! Enrichment of canonical records from a secondary metadata map.
//!
//! The enrichment map is keyed by identifiers that do not always match a
//! canonical id. Each key is resolved by two strategies, in order:
//!
//! 1. **Skill URL**: the remainder of a record's `skill_url` after the
//!    configured platform prefix.
//! 2. **Separator-normalized id**: the key with `_` replaced by `/`,
//!    looked up as a canonical id.
//!
//! Keys that match neither are skipped and show up in the coverage report.
//!
//! Field policy per matched record:
//!
//! | Field | Policy |
//! |-------|--------|
//! | `description` | fill if absent, truncated to `description_max_chars` |
//! | `tags` | overwrite when the incoming list is non-empty |
//! | `category`, `license` | fill if absent |
//! | `body_length`, `file_size` | overwrite when numeric |

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::coerce::{truncate_chars, LooseValue};
use crate::models::CanonicalSkillRecord;

/// Enrichment snapshot: key → partial metadata. `BTreeMap` keeps
/// application order independent of file layout.
pub type EnrichmentMap = BTreeMap<String, EnrichmentEntry>;

/// One loosely typed enrichment entry as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnrichmentEntry {
    pub description: Option<LooseValue>,
    pub tags: Option<LooseValue>,
    pub category: Option<LooseValue>,
    pub license: Option<LooseValue>,
    #[serde(rename = "bodyLength")]
    pub body_length: Option<LooseValue>,
    #[serde(rename = "fileSize")]
    pub file_size: Option<LooseValue>,
    #[serde(rename = "_meta")]
    pub meta: Option<MetaBlock>,
}

/// The `_meta` block some entries carry size metrics in.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetaBlock {
    Sizes {
        #[serde(rename = "bodyLength", default)]
        body_length: Option<LooseValue>,
        #[serde(rename = "fileSize", default)]
        file_size: Option<LooseValue>,
    },
    Other(serde_json::Value),
}

/// Strictly typed view of an entry after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentPatch {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub license: Option<String>,
    pub body_length: Option<i64>,
    pub file_size: Option<i64>,
}

impl EnrichmentPatch {
    pub fn from_entry(entry: &EnrichmentEntry, description_max_chars: usize) -> Self {
        let (meta_body, meta_size) = match &entry.meta {
            Some(MetaBlock::Sizes {
                body_length,
                file_size,
            }) => (body_length.as_ref(), file_size.as_ref()),
            _ => (None, None),
        };

        Self {
            description: entry
                .description
                .as_ref()
                .and_then(LooseValue::as_text)
                .map(|d| truncate_chars(&d, description_max_chars)),
            tags: entry.tags.as_ref().and_then(LooseValue::as_list),
            category: entry.category.as_ref().and_then(LooseValue::as_text),
            license: entry.license.as_ref().and_then(LooseValue::as_text),
            body_length: entry
                .body_length
                .as_ref()
                .or(meta_body)
                .and_then(LooseValue::as_int),
            file_size: entry
                .file_size
                .as_ref()
                .or(meta_size)
                .and_then(LooseValue::as_int),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub skill_url_prefix: String,
    pub description_max_chars: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            skill_url_prefix: "https://skillsmp.com/skills/".to_string(),
            description_max_chars: 2000,
        }
    }
}

/// How an enrichment key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    SkillUrl,
    SeparatorNormalizedId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldCounts {
    pub description: usize,
    pub tags: usize,
    pub category: usize,
    pub license: usize,
    pub body_length: usize,
    pub file_size: usize,
}

/// How many records carry each display field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub total: usize,
    pub with_description: usize,
    pub with_tags: usize,
    pub with_category: usize,
}

impl Coverage {
    pub fn measure(records: &[CanonicalSkillRecord]) -> Self {
        Self {
            total: records.len(),
            with_description: records.iter().filter(|r| r.has_description()).count(),
            with_tags: records.iter().filter(|r| r.has_tags()).count(),
            with_category: records.iter().filter(|r| r.has_category()).count(),
        }
    }
}

pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Coverage report for one enrichment pass. Partial matching is expected;
/// this is informational only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub entries: usize,
    pub matched_by_url: usize,
    pub matched_by_id: usize,
    pub filled: FieldCounts,
    pub before: Coverage,
    pub after: Coverage,
}

impl EnrichmentReport {
    pub fn matched(&self) -> usize {
        self.matched_by_url + self.matched_by_id
    }

    pub fn unmatched(&self) -> usize {
        self.entries - self.matched()
    }

    pub fn match_rate(&self) -> f64 {
        percent(self.matched(), self.entries)
    }

    /// Emit the report through `tracing`.
    pub fn log(&self) {
        tracing::info!(
            entries = self.entries,
            matched = self.matched(),
            by_url = self.matched_by_url,
            by_id = self.matched_by_id,
            unmatched = self.unmatched(),
            "enrichment matched {:.1}% of entries",
            self.match_rate()
        );
        tracing::info!(
            description = self.filled.description,
            tags = self.filled.tags,
            category = self.filled.category,
            license = self.filled.license,
            body_length = self.filled.body_length,
            file_size = self.filled.file_size,
            "enrichment fields applied"
        );
        for (label, before, after) in [
            ("description", self.before.with_description, self.after.with_description),
            ("tags", self.before.with_tags, self.after.with_tags),
            ("category", self.before.with_category, self.after.with_category),
        ] {
            tracing::info!(
                "coverage {}: {:.1}% -> {:.1}% of {}",
                label,
                percent(before, self.before.total),
                percent(after, self.after.total),
                self.after.total
            );
        }
    }
}

/// Resolve enrichment keys to record positions.
struct Matcher {
    by_url: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl Matcher {
    fn new(records: &[CanonicalSkillRecord], prefix: &str) -> Self {
        let mut by_url = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_id.insert(r.id.clone(), i);
            if let Some(key) = r
                .skill_url
                .as_deref()
                .and_then(|url| url.strip_prefix(prefix))
                .filter(|k| !k.is_empty())
            {
                by_url.insert(key.to_string(), i);
            }
        }
        Self { by_url, by_id }
    }

    fn resolve(&self, key: &str) -> Option<(usize, MatchStrategy)> {
        if let Some(&i) = self.by_url.get(key) {
            return Some((i, MatchStrategy::SkillUrl));
        }
        self.by_id
            .get(&key.replace('_', "/"))
            .map(|&i| (i, MatchStrategy::SeparatorNormalizedId))
    }
}

/// Apply `map` to `records` in place and report coverage.
pub fn enrich(
    records: &mut [CanonicalSkillRecord],
    map: &EnrichmentMap,
    options: &EnrichOptions,
) -> EnrichmentReport {
    let mut report = EnrichmentReport {
        entries: map.len(),
        before: Coverage::measure(records),
        ..Default::default()
    };

    let matcher = Matcher::new(records, &options.skill_url_prefix);

    for (key, entry) in map {
        let Some((idx, strategy)) = matcher.resolve(key) else {
            tracing::debug!(key = %key, "enrichment key matched no record");
            continue;
        };
        match strategy {
            MatchStrategy::SkillUrl => report.matched_by_url += 1,
            MatchStrategy::SeparatorNormalizedId => report.matched_by_id += 1,
        }

        let patch = EnrichmentPatch::from_entry(entry, options.description_max_chars);
        apply_patch(&mut records[idx], patch, &mut report.filled);
    }

    report.after = Coverage::measure(records);
    report
}

fn apply_patch(record: &mut CanonicalSkillRecord, patch: EnrichmentPatch, filled: &mut FieldCounts) {
    if !record.has_description() {
        if let Some(description) = patch.description {
            record.description = Some(description);
            filled.description += 1;
        }
    }

    if let Some(tags) = patch.tags {
        record.tags = Some(tags);
        filled.tags += 1;
    }

    if !record.has_category() {
        if let Some(category) = patch.category {
            record.category = Some(category);
            filled.category += 1;
        }
    }

    if !crate::models::is_present(&record.license) {
        if let Some(license) = patch.license {
            record.license = Some(license);
            filled.license += 1;
        }
    }

    if let Some(n) = patch.body_length {
        record.body_length = Some(n);
        filled.body_length += 1;
    }
    if let Some(n) = patch.file_size {
        record.file_size = Some(n);
        filled.file_size += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: serde_json::Value) -> EnrichmentMap {
        serde_json::from_value(v).unwrap()
    }

    fn record(id: &str) -> CanonicalSkillRecord {
        let mut r = CanonicalSkillRecord::new(id, id);
        r.sources = vec!["skillsmp".into()];
        r
    }

    #[test]
    fn test_match_by_skill_url_first() {
        let mut a = record("acme/lint");
        a.skill_url = Some("https://skillsmp.com/skills/acme_lint".into());
        let mut records = vec![a, record("acme/lint2")];

        let report = enrich(
            &mut records,
            &map(json!({ "acme_lint": { "category": "tooling" } })),
            &EnrichOptions::default(),
        );

        assert_eq!(report.matched_by_url, 1);
        assert_eq!(report.matched_by_id, 0);
        assert_eq!(records[0].category.as_deref(), Some("tooling"));
    }

    #[test]
    fn test_match_by_separator_normalized_id() {
        let mut records = vec![record("acme/tools/lint")];
        let report = enrich(
            &mut records,
            &map(json!({ "acme_tools_lint": { "license": "MIT" }, "nobody_home": {} })),
            &EnrichOptions::default(),
        );

        assert_eq!(report.matched_by_id, 1);
        assert_eq!(report.unmatched(), 1);
        assert!((report.match_rate() - 50.0).abs() < 1e-9);
        assert_eq!(records[0].license.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_description_truncated_to_limit() {
        let mut records = vec![record("a")];
        enrich(
            &mut records,
            &map(json!({ "a": { "description": "x".repeat(5000) } })),
            &EnrichOptions::default(),
        );
        assert_eq!(records[0].description.as_ref().unwrap().chars().count(), 2000);
    }

    #[test]
    fn test_fill_if_absent_keeps_existing_values() {
        let mut r = record("a");
        r.description = Some("original".into());
        r.category = Some("docs".into());
        r.license = Some("Apache-2.0".into());
        let mut records = vec![r];

        let report = enrich(
            &mut records,
            &map(json!({ "a": { "description": "new", "category": "other", "license": "MIT" } })),
            &EnrichOptions::default(),
        );

        assert_eq!(records[0].description.as_deref(), Some("original"));
        assert_eq!(records[0].category.as_deref(), Some("docs"));
        assert_eq!(records[0].license.as_deref(), Some("Apache-2.0"));
        assert_eq!(report.filled, FieldCounts::default());
    }

    #[test]
    fn test_empty_description_is_filled() {
        let mut r = record("a");
        r.description = Some(String::new());
        let mut records = vec![r];
        enrich(
            &mut records,
            &map(json!({ "a": { "description": 42 } })),
            &EnrichOptions::default(),
        );
        assert_eq!(records[0].description.as_deref(), Some("42"));
    }

    #[test]
    fn test_tags_and_sizes_overwrite() {
        let mut r = record("a");
        r.tags = Some(vec!["stale".into()]);
        r.body_length = Some(1);
        let mut records = vec![r];

        enrich(
            &mut records,
            &map(json!({ "a": {
                "tags": "react, hooks",
                "_meta": { "bodyLength": 900, "fileSize": "2048" }
            } })),
            &EnrichOptions::default(),
        );

        assert_eq!(records[0].tags, Some(vec!["react".to_string(), "hooks".to_string()]));
        assert_eq!(records[0].body_length, Some(900));
        assert_eq!(records[0].file_size, Some(2048));
    }

    #[test]
    fn test_empty_tags_do_not_overwrite() {
        let mut r = record("a");
        r.tags = Some(vec!["keep".into()]);
        let mut records = vec![r];
        enrich(
            &mut records,
            &map(json!({ "a": { "tags": [] } })),
            &EnrichOptions::default(),
        );
        assert_eq!(records[0].tags, Some(vec!["keep".to_string()]));
    }

    #[test]
    fn test_non_coercible_fields_are_absent() {
        let mut records = vec![record("a")];
        let report = enrich(
            &mut records,
            &map(json!({ "a": {
                "category": {"nested": true},
                "bodyLength": "lots",
                "_meta": "not an object"
            } })),
            &EnrichOptions::default(),
        );
        assert_eq!(report.matched(), 1);
        assert!(records[0].category.is_none());
        assert!(records[0].body_length.is_none());
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let enrichment = map(json!({
            "a": { "description": "d", "tags": ["t1"], "category": "c", "bodyLength": 5 },
            "b": { "license": "MIT", "fileSize": 10 }
        }));
        let mut once = vec![record("a"), record("b")];
        enrich(&mut once, &enrichment, &EnrichOptions::default());

        let mut twice = once.clone();
        enrich(&mut twice, &enrichment, &EnrichOptions::default());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_coverage_before_and_after() {
        let mut records = vec![record("a"), record("b")];
        let report = enrich(
            &mut records,
            &map(json!({ "a": { "description": "d", "tags": "x" } })),
            &EnrichOptions::default(),
        );
        assert_eq!(report.before.with_description, 0);
        assert_eq!(report.after.with_description, 1);
        assert_eq!(report.after.with_tags, 1);
        assert_eq!(report.after.total, 2);
    }
}
