//! Full index rebuild.
//!
//! [`build_index`] replaces the whole index from a canonical record set in a
//! single SQLite transaction:
//!
//! 1. validate the input (non-empty, unique ids, provenance present)
//! 2. drop and recreate `skills` / `skills_fts`
//! 3. insert records in batches
//! 4. populate the text index from `skills`
//! 5. run a self-test query and check it is non-empty and ordered
//! 6. record `build_info`, then commit
//!
//! Any failure before the commit rolls the transaction back, so readers
//! only ever see the previous complete index or the new complete one.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::{BuildConfig, Config, MAX_BATCH_SIZE};
use crate::enrich::{self, EnrichOptions};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::CanonicalSkillRecord;
use crate::normalize;
use crate::snapshot;
use crate::search::{count_matches, fetch_page, QueryPlan, SearchRequest};
use crate::stats::{self, format_bytes, OwnerCount, Stats};
use crate::store::{encode_list, SkillStore};

/// Records shown in the self-test section of the report.
const SELF_TEST_LIMIT: u32 = 5;
const TOP_OWNERS: i64 = 10;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub batch_size: usize,
    /// A term common enough that the new index must return hits for it.
    pub self_test_term: String,
}

impl From<&BuildConfig> for BuildOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            self_test_term: config.self_test_term.clone(),
        }
    }
}

/// Top hits of the post-build self-test query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestReport {
    pub term: String,
    pub total_matching: i64,
    pub top: Vec<SelfTestHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestHit {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub installs: i64,
}

/// Aggregates read back from the committed index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub stats: Stats,
    pub with_github_url: i64,
    pub top_owners: Vec<OwnerCount>,
}

/// Summary of a successful build, for operational logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub inserted: usize,
    pub batches: usize,
    pub built_at: i64,
    pub snapshot_sha256: String,
    /// `None` when the post-commit reads failed; the build itself stands.
    pub summary: Option<IndexSummary>,
    pub self_test: SelfTestReport,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn log(&self) {
        tracing::info!(
            inserted = self.inserted,
            batches = self.batches,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "index build committed"
        );
        if let Some(summary) = &self.summary {
            tracing::info!(
                total = summary.stats.total,
                with_description = summary.stats.with_description,
                with_github_url = summary.with_github_url,
                "index contents"
            );
            for (source, count) in &summary.stats.per_source {
                tracing::info!(source = %source, count, "records per source");
            }
            let owners: Vec<String> = summary
                .top_owners
                .iter()
                .map(|o| format!("{}({})", o.owner, o.count))
                .collect();
            tracing::info!("top owners: {}", owners.join(", "));
        }
        let hits: Vec<String> = self
            .self_test
            .top
            .iter()
            .map(|h| format!("{}/{}({})", h.owner.as_deref().unwrap_or("-"), h.name, h.installs))
            .collect();
        tracing::info!(
            term = %self.self_test.term,
            total = self.self_test.total_matching,
            "self-test: {}",
            hits.join(", ")
        );
    }
}

/// Check the build preconditions without touching the store.
pub fn validate_records(records: &[CanonicalSkillRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(Error::EmptySnapshot);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(Error::DuplicateId(record.id.clone()));
        }
        if record.sources.is_empty() {
            return Err(Error::InvalidRecord {
                id: record.id.clone(),
                reason: "no source tag".to_string(),
            });
        }
        if record.installs < 0 {
            return Err(Error::InvalidRecord {
                id: record.id.clone(),
                reason: format!("negative installs ({})", record.installs),
            });
        }
    }
    Ok(())
}

/// Replace the index with `records`.
pub async fn build_index(
    store: &SkillStore,
    records: &[CanonicalSkillRecord],
    snapshot_sha256: &str,
    options: &BuildOptions,
) -> Result<BuildReport> {
    let started = Instant::now();
    validate_records(records)?;
    let batch_size = options.batch_size.clamp(1, MAX_BATCH_SIZE);

    let mut tx = store.pool().begin().await?;

    migrate::drop_schema(&mut tx).await?;
    migrate::create_schema(&mut tx).await?;

    let mut batches = 0;
    for batch in records.chunks(batch_size) {
        insert_batch(&mut tx, batch).await?;
        batches += 1;
        let inserted = (batches * batch_size).min(records.len());
        if batches % 50 == 0 || inserted == records.len() {
            tracing::info!(inserted, total = records.len(), "records inserted");
        }
    }

    sqlx::query(
        r#"
        INSERT INTO skills_fts (rowid, name, description, owner, tags)
        SELECT row_id, name, COALESCE(description, ''), COALESCE(owner, ''), COALESCE(tags, '')
        FROM skills
        "#,
    )
    .execute(&mut *tx)
    .await?;
    tracing::debug!("text index populated");

    let self_test = self_test(&mut tx, &options.self_test_term).await?;

    let built_at = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO build_info (id, built_at, record_count, snapshot_sha256) VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            built_at = excluded.built_at,
            record_count = excluded.record_count,
            snapshot_sha256 = excluded.snapshot_sha256
        "#,
    )
    .bind(built_at)
    .bind(records.len() as i64)
    .bind(snapshot_sha256)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let summary = summary_or_warn(summarize(store).await);

    Ok(BuildReport {
        inserted: records.len(),
        batches,
        built_at,
        snapshot_sha256: snapshot_sha256.to_string(),
        summary,
        self_test,
        elapsed: started.elapsed(),
    })
}

/// Read the aggregates of the current index.
pub async fn summarize(store: &SkillStore) -> Result<IndexSummary> {
    let (stats, with_github_url, top_owners) = tokio::try_join!(
        stats::collect(store),
        stats::count_with_github_url(store),
        stats::top_owners(store, TOP_OWNERS),
    )?;
    Ok(IndexSummary {
        stats,
        with_github_url,
        top_owners,
    })
}

/// The new index is already live when the summary is read, so a failed
/// read is logged rather than reported as a failed build.
fn summary_or_warn(result: Result<IndexSummary>) -> Option<IndexSummary> {
    match result {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::warn!(error = %e, "index committed but its summary could not be read");
            None
        }
    }
}

async fn insert_batch(conn: &mut SqliteConnection, batch: &[CanonicalSkillRecord]) -> Result<()> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO skills (id, name, description, owner, repo, skill_name, skill_path, \
         github_url, skill_url, sources, installs, license, version, published_at, \
         category, tags, body_length, file_size, quality_score) ",
    );

    builder.push_values(batch, |mut row, r| {
        row.push_bind(r.id.as_str())
            .push_bind(r.name.as_str())
            .push_bind(r.description.as_deref())
            .push_bind(r.owner.as_deref())
            .push_bind(r.repo.as_deref())
            .push_bind(r.skill_name.as_deref())
            .push_bind(r.skill_path.as_deref())
            .push_bind(r.github_url.as_deref())
            .push_bind(r.skill_url.as_deref())
            .push_bind(encode_list(&r.sources))
            .push_bind(r.installs)
            .push_bind(r.license.as_deref())
            .push_bind(r.version.as_deref())
            .push_bind(r.published_at)
            .push_bind(r.category.as_deref())
            .push_bind(r.tags.as_deref().map(encode_list))
            .push_bind(r.body_length)
            .push_bind(r.file_size)
            .push_bind(r.quality_score);
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Query the uncommitted index for `term` through the regular text-match
/// plan and require non-empty, installs-descending results.
async fn self_test(conn: &mut SqliteConnection, term: &str) -> Result<SelfTestReport> {
    let fail = |reason: String| Error::SelfTest {
        term: term.to_string(),
        reason,
    };

    let request = SearchRequest {
        term: Some(term.to_string()),
        page: 1,
        limit: SELF_TEST_LIMIT,
        ..Default::default()
    };
    let plan = QueryPlan::for_request(&request);
    if !matches!(plan, QueryPlan::TextMatch { .. }) {
        return Err(fail("term has no searchable tokens".to_string()));
    }
    let query = plan.compose(request.limit, request.offset());

    let total_matching = count_matches(&mut *conn, &query).await?;
    let records = fetch_page(&mut *conn, &query).await?;

    if total_matching == 0 || records.is_empty() {
        return Err(fail("no matching records".to_string()));
    }
    if records.windows(2).any(|w| w[0].installs < w[1].installs) {
        return Err(fail("results are not ordered by installs".to_string()));
    }

    Ok(SelfTestReport {
        term: term.to_string(),
        total_matching,
        top: records
            .into_iter()
            .map(|r| SelfTestHit {
                id: r.id,
                name: r.name,
                owner: r.owner,
                installs: r.installs,
            })
            .collect(),
    })
}

/// `skilldb build`: load the configured snapshots, normalize and enrich
/// them, then replace the index. With `dry_run` nothing is written.
pub async fn run_build(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    let loaded = snapshot::load_sources(&config.snapshot)?;
    let (mut records, normalized) = normalize::normalize(&loaded.batches)?;
    tracing::info!(
        raw = normalized.raw_entries,
        canonical = normalized.canonical_records,
        merged = normalized.merged_entries,
        "normalized raw snapshots"
    );

    if let Some(path) = &config.snapshot.enrichment {
        let map = snapshot::load_enrichment(path)?;
        let options = EnrichOptions {
            skill_url_prefix: config.snapshot.skill_url_prefix.clone(),
            description_max_chars: config.snapshot.description_max_chars,
        };
        enrich::enrich(&mut records, &map, &options).log();
    }

    validate_records(&records)?;

    if dry_run {
        println!("build (dry-run)");
        println!("  raw entries: {}", normalized.raw_entries);
        println!("  canonical records: {}", records.len());
        println!("  merged entries: {}", normalized.merged_entries);
        println!("  snapshot: {}", loaded.digest);
        return Ok(());
    }

    let store = SkillStore::open(config).await?;
    let options = BuildOptions::from(&config.build);
    let result = build_index(&store, &records, &loaded.digest, &options).await;
    store.close().await;
    let report = result?;
    report.log();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("build");
    println!("  records inserted: {}", report.inserted);
    println!("  batches: {}", report.batches);
    match &report.summary {
        Some(summary) => {
            println!("  with description: {}", summary.stats.with_description);
            println!("  with github url: {}", summary.with_github_url);
            for (source, count) in &summary.stats.per_source {
                println!("  source {}: {}", source, count);
            }
        }
        None => println!("  summary: unavailable (see log)"),
    }
    println!(
        "  self-test \"{}\": {} matching",
        report.self_test.term, report.self_test.total_matching
    );
    println!("  database size: {}", format_bytes(db_size));
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, installs: i64) -> CanonicalSkillRecord {
        let mut r = CanonicalSkillRecord::new(id, id);
        r.installs = installs;
        r.sources = vec!["s1".into()];
        r
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(validate_records(&[]), Err(Error::EmptySnapshot)));
    }

    #[test]
    fn test_validate_rejects_duplicate_id() {
        let err = validate_records(&[record("a", 1), record("b", 2), record("a", 3)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(ref id) if id == "a"));
    }

    #[test]
    fn test_validate_rejects_missing_sources() {
        let mut r = record("a", 1);
        r.sources.clear();
        assert!(matches!(
            validate_records(&[r]),
            Err(Error::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_failed_summary_does_not_fail_build() {
        let failed: Result<IndexSummary> = Err(Error::Timeout(Duration::from_millis(1)));
        assert!(summary_or_warn(failed).is_none());
    }

    #[test]
    fn test_validate_accepts_empty_name() {
        let mut r = record("a", 0);
        r.name = String::new();
        assert!(validate_records(&[r]).is_ok());
    }
}
