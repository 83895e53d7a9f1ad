//! Merge raw per-source entries into canonical records.
//!
//! Entries are grouped by trimmed id in first-seen order. Within a group:
//!
//! | Field | Rule |
//! |-------|------|
//! | `name`, optional text fields | first non-blank value |
//! | `sources` | ordered union, duplicates removed |
//! | `installs` | maximum coerced value, clamped to `>= 0` |
//! | `published_at`, `quality_score` | first coercible value |
//! | `tags`, `body_length`, `file_size` | last non-empty value |
//!
//! An entry without an id, or without any provenance (neither its own
//! `sources`/`source` nor a default tag for its snapshot file), makes the
//! snapshot unusable and aborts normalization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::coerce::LooseValue;
use crate::error::{Error, Result};
use crate::models::{is_present, CanonicalSkillRecord, RawSourceEntry};

/// Raw entries read from one snapshot file.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub path: PathBuf,
    pub default_tag: Option<String>,
    pub entries: Vec<RawSourceEntry>,
}

/// Counts describing a normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub raw_entries: usize,
    pub canonical_records: usize,
    /// Raw entries folded into a record that already existed.
    pub merged_entries: usize,
}

/// Merge every batch into one canonical set.
pub fn normalize(batches: &[SourceBatch]) -> Result<(Vec<CanonicalSkillRecord>, NormalizeReport)> {
    let mut records: Vec<CanonicalSkillRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut report = NormalizeReport::default();

    for batch in batches {
        for (i, entry) in batch.entries.iter().enumerate() {
            report.raw_entries += 1;

            let id = entry
                .id
                .as_ref()
                .and_then(LooseValue::as_text)
                .map(|id| id.trim().to_string())
                .ok_or_else(|| Error::ingestion(&batch.path, format!("entry {} has no id", i)))?;
            let id = id.as_str();

            let tags = provenance(entry, batch.default_tag.as_deref());
            if tags.is_empty() {
                return Err(no_provenance(&batch.path, id));
            }

            match positions.get(id) {
                Some(&pos) => {
                    merge_into(&mut records[pos], entry, &tags);
                    report.merged_entries += 1;
                }
                None => {
                    let mut record = CanonicalSkillRecord::new(id, "");
                    merge_into(&mut record, entry, &tags);
                    positions.insert(id.to_string(), records.len());
                    records.push(record);
                }
            }
        }
    }

    report.canonical_records = records.len();
    Ok((records, report))
}

fn no_provenance(path: &Path, id: &str) -> Error {
    Error::ingestion(path, format!("entry {:?} has no source tag", id))
}

/// The entry's own provenance, falling back to the snapshot's default tag.
fn provenance(entry: &RawSourceEntry, default_tag: Option<&str>) -> Vec<String> {
    let own = entry
        .sources
        .as_ref()
        .and_then(|s| s.as_list())
        .or_else(|| {
            entry
                .source
                .as_ref()
                .and_then(LooseValue::as_text)
                .map(|s| vec![s.trim().to_string()])
        });

    match own {
        Some(tags) => tags,
        None => default_tag.map(|t| vec![t.to_string()]).unwrap_or_default(),
    }
}

fn merge_into(record: &mut CanonicalSkillRecord, entry: &RawSourceEntry, tags: &[String]) {
    if record.name.trim().is_empty() {
        if let Some(name) = entry.name.as_ref().and_then(LooseValue::as_text) {
            record.name = name;
        }
    }

    fill(&mut record.description, &entry.description);
    fill(&mut record.owner, &entry.owner);
    fill(&mut record.repo, &entry.repo);
    fill(&mut record.skill_name, &entry.skill_name);
    fill(&mut record.skill_path, &entry.skill_path);
    fill(&mut record.github_url, &entry.github_url);
    fill(&mut record.skill_url, &entry.skill_url);
    fill(&mut record.license, &entry.license);
    fill(&mut record.version, &entry.version);
    fill(&mut record.category, &entry.category);

    for tag in tags {
        if !record.sources.contains(tag) {
            record.sources.push(tag.clone());
        }
    }

    if let Some(installs) = entry.installs.as_ref().and_then(|v| v.as_int()) {
        record.installs = record.installs.max(installs.max(0));
    }

    if record.published_at.is_none() {
        record.published_at = entry.published_at.as_ref().and_then(|v| v.as_timestamp());
    }
    if record.quality_score.is_none() {
        record.quality_score = entry.quality_score.as_ref().and_then(|v| v.as_float());
    }

    if let Some(entry_tags) = entry.tags.as_ref().and_then(|v| v.as_list()) {
        record.tags = Some(entry_tags);
    }
    if let Some(n) = entry.body_length.as_ref().and_then(|v| v.as_int()) {
        record.body_length = Some(n);
    }
    if let Some(n) = entry.file_size.as_ref().and_then(|v| v.as_int()) {
        record.file_size = Some(n);
    }
}

/// Fill-if-absent for optional text.
fn fill(target: &mut Option<String>, incoming: &Option<LooseValue>) {
    if !is_present(target) {
        if let Some(text) = incoming.as_ref().and_then(LooseValue::as_text) {
            *target = Some(text);
        }
    }
}
