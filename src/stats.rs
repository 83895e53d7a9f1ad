//! Catalog statistics.
//!
//! Counts are computed fresh against the current index on every call: the
//! total, how many records carry a description, per-source counts (a record
//! listed under two sources counts for both), and per-category counts.
//! Used by `skilldb stats`, `GET /api/stats`, and the build report.

use serde::Serialize;
use sqlx::Row;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::Result;
use crate::models::KNOWN_SOURCES;
use crate::store::SkillStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: i64,
    pub with_description: i64,
    pub per_source: BTreeMap<String, i64>,
    /// Non-empty categories, most common first.
    pub per_category: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerCount {
    pub owner: String,
    pub count: i64,
}

/// Metadata about the last successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub built_at: i64,
    pub record_count: i64,
    pub snapshot_sha256: String,
}

/// Compute [`Stats`]; the four reads run concurrently.
pub async fn collect(store: &SkillStore) -> Result<Stats> {
    let pool = store.pool();

    let total = async {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM skills")
            .fetch_one(pool)
            .await
    };
    let with_description = async {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM skills WHERE description IS NOT NULL AND trim(description) != ''",
        )
        .fetch_one(pool)
        .await
    };
    let sources = async {
        sqlx::query(
            r#"
            SELECT j.value AS tag, COUNT(DISTINCT s.row_id) AS count
            FROM skills s, json_each(s.sources) j
            GROUP BY j.value
            "#,
        )
        .fetch_all(pool)
        .await
    };
    let categories = async {
        sqlx::query(
            r#"
            SELECT category, COUNT(*) AS count FROM skills
            WHERE category IS NOT NULL AND category != ''
            GROUP BY category
            ORDER BY count DESC, category ASC
            "#,
        )
        .fetch_all(pool)
        .await
    };

    let (total, with_description, source_rows, category_rows) =
        tokio::try_join!(total, with_description, sources, categories)?;

    let mut per_source: BTreeMap<String, i64> = KNOWN_SOURCES
        .iter()
        .map(|tag| (tag.to_string(), 0))
        .collect();
    for row in &source_rows {
        per_source.insert(row.try_get("tag")?, row.try_get("count")?);
    }

    let per_category = category_rows
        .iter()
        .map(|row| {
            Ok(CategoryCount {
                category: row.try_get("category")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

    Ok(Stats {
        total,
        with_description,
        per_source,
        per_category,
    })
}

pub async fn count_with_github_url(store: &SkillStore) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM skills WHERE github_url IS NOT NULL AND github_url != ''",
    )
    .fetch_one(store.pool())
    .await?)
}

/// Owners with the most records.
pub async fn top_owners(store: &SkillStore, limit: i64) -> Result<Vec<OwnerCount>> {
    let rows = sqlx::query(
        r#"
        SELECT owner, COUNT(*) AS count FROM skills
        WHERE owner IS NOT NULL AND owner != ''
        GROUP BY owner
        ORDER BY count DESC, owner ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(store.pool())
    .await?;

    let owners = rows
        .iter()
        .map(|row| {
            Ok(OwnerCount {
                owner: row.try_get("owner")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
    Ok(owners)
}

pub async fn build_info(store: &SkillStore) -> Result<Option<BuildInfo>> {
    let row = sqlx::query(
        "SELECT built_at, record_count, snapshot_sha256 FROM build_info WHERE id = 1",
    )
    .fetch_optional(store.pool())
    .await?;

    let info = match row {
        Some(row) => Some(BuildInfo {
            built_at: row.try_get("built_at")?,
            record_count: row.try_get("record_count")?,
            snapshot_sha256: row.try_get("snapshot_sha256")?,
        }),
        None => None,
    };
    Ok(info)
}

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = SkillStore::open(config).await?;
    let stats = collect(&store).await?;
    let info = build_info(&store).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("skilldb index stats");
    println!("===================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    match &info {
        Some(info) => {
            println!("  Built:       {}", format_ts_iso(info.built_at));
            println!("  Snapshot:    {}", &info.snapshot_sha256[..12.min(info.snapshot_sha256.len())]);
        }
        None => println!("  Built:       never"),
    }
    println!();
    println!("  Skills:      {}", stats.total);
    println!(
        "  Described:   {} / {} ({}%)",
        stats.with_description,
        stats.total,
        if stats.total > 0 {
            (stats.with_description * 100) / stats.total
        } else {
            0
        }
    );

    println!();
    println!("  By source:");
    for (source, count) in &stats.per_source {
        println!("    {:<24} {:>8}", source, count);
    }

    if !stats.per_category.is_empty() {
        println!();
        println!("  By category:");
        for c in &stats.per_category {
            println!("    {:<24} {:>8}", c.category, c.count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_ts_iso() {
        assert_eq!(format_ts_iso(0), "1970-01-01 00:00");
    }
}
