//! The index-store handle and its row codec.
//!
//! [`SkillStore`] wraps the process-wide [`SqlitePool`]. It is cheap to
//! clone and is passed explicitly to the builder, planner and stats
//! aggregator. The JSON text encoding of `sources` and `tags` lives here
//! and nowhere else; the rest of the crate only sees `Vec<String>`.

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::models::CanonicalSkillRecord;

/// Columns selected for a full record, qualified with the `s` alias.
pub(crate) const SKILL_COLUMNS: &str = "s.id, s.name, s.description, s.owner, s.repo, \
    s.skill_name, s.skill_path, s.github_url, s.skill_url, s.sources, s.installs, \
    s.license, s.version, s.published_at, s.category, s.tags, s.body_length, \
    s.file_size, s.quality_score";

#[derive(Debug, Clone)]
pub struct SkillStore {
    pool: SqlitePool,
}

impl SkillStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Acquire the pool for the configured database.
    pub async fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release every pooled connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Encode an ordered label list as a JSON array.
pub(crate) fn encode_list(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

/// Decode a JSON array written by [`encode_list`]. Unreadable text decodes
/// as an empty list.
pub(crate) fn decode_list(text: &str) -> Vec<String> {
    serde_json::from_str(text).unwrap_or_default()
}

/// The text a source tag occupies inside an encoded `sources` column,
/// quotes included, so that `s1` never matches `s10`.
pub(crate) fn source_needle(tag: &str) -> String {
    Value::from(tag).to_string()
}

pub(crate) fn decode_record(row: &SqliteRow) -> std::result::Result<CanonicalSkillRecord, sqlx::Error> {
    let sources: String = row.try_get("sources")?;
    let tags: Option<String> = row.try_get("tags")?;

    Ok(CanonicalSkillRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        owner: row.try_get("owner")?,
        repo: row.try_get("repo")?,
        skill_name: row.try_get("skill_name")?,
        skill_path: row.try_get("skill_path")?,
        github_url: row.try_get("github_url")?,
        skill_url: row.try_get("skill_url")?,
        sources: decode_list(&sources),
        installs: row.try_get("installs")?,
        license: row.try_get("license")?,
        version: row.try_get("version")?,
        published_at: row.try_get("published_at")?,
        category: row.try_get("category")?,
        tags: tags.map(|t| decode_list(&t)),
        body_length: row.try_get("body_length")?,
        file_size: row.try_get("file_size")?,
        quality_score: row.try_get("quality_score")?,
    })
}
