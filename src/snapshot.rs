//! Reading snapshot files from disk.
//!
//! Raw snapshots are JSON arrays of [`RawSourceEntry`]; the enrichment
//! snapshot is a JSON object keyed by enrichment id. Anything that does not
//! parse as that shape is an ingestion error and aborts the run before any
//! state is written.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::SnapshotConfig;
use crate::enrich::EnrichmentMap;
use crate::error::{Error, Result};
use crate::models::RawSourceEntry;
use crate::normalize::SourceBatch;

/// Every configured raw snapshot, plus a digest over their bytes.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub batches: Vec<SourceBatch>,
    /// Hex SHA-256 over the raw snapshot files in configuration order.
    pub digest: String,
}

pub fn load_sources(config: &SnapshotConfig) -> Result<LoadedSnapshot> {
    let mut hasher = Sha256::new();
    let mut batches = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let bytes = read(&source.path)?;
        hasher.update(&bytes);

        let entries: Vec<RawSourceEntry> =
            serde_json::from_slice(&bytes).map_err(|e| Error::ingestion(&source.path, e))?;
        tracing::info!(
            path = %source.path.display(),
            entries = entries.len(),
            "loaded raw snapshot"
        );

        batches.push(SourceBatch {
            path: source.path.clone(),
            default_tag: source.tag.clone(),
            entries,
        });
    }

    Ok(LoadedSnapshot {
        batches,
        digest: format!("{:x}", hasher.finalize()),
    })
}

pub fn load_enrichment(path: &Path) -> Result<EnrichmentMap> {
    let bytes = read(path)?;
    let map: EnrichmentMap =
        serde_json::from_slice(&bytes).map_err(|e| Error::ingestion(path, e))?;
    tracing::info!(path = %path.display(), entries = map.len(), "loaded enrichment snapshot");
    Ok(map)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::ingestion(path, format!("cannot read file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSnapshotConfig;
    use std::fs;
    use tempfile::TempDir;

    fn snapshot_config(tmp: &TempDir, files: &[(&str, &str)]) -> SnapshotConfig {
        let mut config = SnapshotConfig::default();
        for (name, body) in files {
            let path = tmp.path().join(name);
            fs::write(&path, body).unwrap();
            config.sources.push(SourceSnapshotConfig {
                path,
                tag: Some("skillsmp".into()),
            });
        }
        config
    }

    #[test]
    fn test_load_sources_reads_each_file() {
        let tmp = TempDir::new().unwrap();
        let config = snapshot_config(
            &tmp,
            &[("a.json", r#"[{"id":"x"}]"#), ("b.json", r#"[{"id":"y"},{"id":"z"}]"#)],
        );
        let loaded = load_sources(&config).unwrap();
        assert_eq!(loaded.batches.len(), 2);
        assert_eq!(loaded.batches[1].entries.len(), 2);
        assert_eq!(loaded.batches[0].default_tag.as_deref(), Some("skillsmp"));
        assert_eq!(loaded.digest.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let a = load_sources(&snapshot_config(&tmp, &[("a.json", r#"[{"id":"x"}]"#)])).unwrap();
        let b = load_sources(&snapshot_config(&tmp, &[("a.json", r#"[{"id":"y"}]"#)])).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_malformed_raw_snapshot_is_ingestion_error() {
        let tmp = TempDir::new().unwrap();
        let config = snapshot_config(&tmp, &[("bad.json", r#"{"id": "not-a-list"}"#)]);
        let err = load_sources(&config).unwrap_err();
        assert!(matches!(err, Error::Ingestion { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_missing_file_is_ingestion_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_enrichment(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Ingestion { .. }));
    }

    #[test]
    fn test_load_enrichment_map() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fm.json");
        fs::write(&path, r#"{"a_b": {"tags": "x,y"}, "c": {}}"#).unwrap();
        let map = load_enrichment(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("a_b"));
    }
}
