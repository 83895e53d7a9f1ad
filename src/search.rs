//! Query planning and execution.
//!
//! A [`SearchRequest`] is turned into exactly one [`QueryPlan`]:
//!
//! - [`QueryPlan::PlainScan`] when there is no usable term: the category and
//!   source predicates run directly against `skills`.
//! - [`QueryPlan::TextMatch`] when the term yields at least one token: the
//!   FTS5 match is joined back to `skills` by row reference and the same
//!   predicates apply to the joined row.
//!
//! Both plans order by `installs DESC, row_id ASC`. Text relevance is never
//! used for ordering. The page and the total are fetched by two independent
//! reads issued concurrently; a deadline cancels both.

use serde::Serialize;
use sqlx::sqlite::Sqlite;
use std::time::Duration;

use crate::config::{Config, MAX_PAGE_LIMIT};
use crate::error::{Error, Result};
use crate::models::CanonicalSkillRecord;
use crate::store::{decode_record, source_needle, SkillStore, SKILL_COLUMNS};

/// A typed search request. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub term: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            term: None,
            category: None,
            source: None,
            page: 1,
            limit: 20,
        }
    }
}

impl SearchRequest {
    /// Clamp `page` to `>= 1` and `limit` to `[1, 100]`; blank filters
    /// become absent.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self.category = self.category.filter(|c| !c.trim().is_empty());
        self.source = self.source.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// Predicates shared by both plans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Exact, case-sensitive match on `category`.
    pub category: Option<String>,
    /// Membership of a tag in `sources`.
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    PlainScan { filters: Filters },
    TextMatch { fts_query: String, filters: Filters },
}

impl QueryPlan {
    pub fn for_request(request: &SearchRequest) -> Self {
        let filters = Filters {
            category: request.category.clone(),
            source: request.source.clone(),
        };
        match request.term.as_deref().and_then(fts_query) {
            Some(fts_query) => Self::TextMatch { fts_query, filters },
            None => Self::PlainScan { filters },
        }
    }

    pub fn filters(&self) -> &Filters {
        match self {
            Self::PlainScan { filters } | Self::TextMatch { filters, .. } => filters,
        }
    }

    /// Render the plan as a page query and a count query sharing one
    /// argument list.
    pub fn compose(&self, limit: u32, offset: i64) -> ComposedQuery {
        let mut conditions: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        let from = match self {
            Self::PlainScan { .. } => "skills s",
            Self::TextMatch { fts_query, .. } => {
                conditions.push("skills_fts MATCH ?");
                args.push(fts_query.clone());
                "skills_fts f JOIN skills s ON f.rowid = s.row_id"
            }
        };

        let filters = self.filters();
        if let Some(category) = &filters.category {
            conditions.push("s.category = ?");
            args.push(category.clone());
        }
        if let Some(source) = &filters.source {
            conditions.push("instr(s.sources, ?) > 0");
            args.push(source_needle(source));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        ComposedQuery {
            select_sql: format!(
                "SELECT {} FROM {}{} ORDER BY s.installs DESC, s.row_id ASC LIMIT ? OFFSET ?",
                SKILL_COLUMNS, from, where_clause
            ),
            count_sql: format!("SELECT COUNT(*) FROM {}{}", from, where_clause),
            args,
            limit: i64::from(limit),
            offset,
        }
    }
}

/// SQL for one plan. `args` bind, in order, to the placeholders of both
/// statements; the page statement then takes `limit` and `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedQuery {
    pub select_sql: String,
    pub count_sql: String,
    pub args: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Build an FTS5 query from free text: whitespace tokens, each quoted (with
/// embedded quotes doubled) and prefix-matched, joined by implicit AND.
/// Tokens without any alphanumeric character are dropped; `None` means the
/// term carries nothing to match.
pub fn fts_query(term: &str) -> Option<String> {
    let tokens: Vec<String> = term
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect();

    (!tokens.is_empty()).then(|| tokens.join(" "))
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub records: Vec<CanonicalSkillRecord>,
    pub total_matching: i64,
    pub page: u32,
    pub limit: u32,
}

pub(crate) async fn fetch_page<'c, E>(executor: E, query: &ComposedQuery) -> Result<Vec<CanonicalSkillRecord>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let mut q = sqlx::query(&query.select_sql);
    for arg in &query.args {
        q = q.bind(arg.as_str());
    }
    let rows = q
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(executor)
        .await?;

    let records = rows
        .iter()
        .map(decode_record)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

pub(crate) async fn count_matches<'c, E>(executor: E, query: &ComposedQuery) -> Result<i64>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let mut q = sqlx::query_scalar::<_, i64>(&query.count_sql);
    for arg in &query.args {
        q = q.bind(arg.as_str());
    }
    Ok(q.fetch_one(executor).await?)
}

/// Run a search. `timeout` bounds the count and page reads together; when
/// it fires both are dropped and [`Error::Timeout`] is returned.
pub async fn search(
    store: &SkillStore,
    request: &SearchRequest,
    timeout: Option<Duration>,
) -> Result<SearchPage> {
    let request = request.clone().normalized();
    let plan = QueryPlan::for_request(&request);
    let query = plan.compose(request.limit, request.offset());
    tracing::debug!(?plan, page = request.page, limit = request.limit, "search");

    let pool = store.pool();
    let reads = async {
        tokio::try_join!(fetch_page(pool, &query), count_matches(pool, &query))
    };

    let (records, total_matching) = match timeout {
        Some(limit) => tokio::time::timeout(limit, reads)
            .await
            .map_err(|_| Error::Timeout(limit))??,
        None => reads.await?,
    };

    Ok(SearchPage {
        records,
        total_matching,
        page: request.page,
        limit: request.limit,
    })
}

/// Exact primary-key lookup. An unknown id is `Ok(None)`.
pub async fn get_by_id(store: &SkillStore, id: &str) -> Result<Option<CanonicalSkillRecord>> {
    let sql = format!("SELECT {} FROM skills s WHERE s.id = ?", SKILL_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(store.pool())
        .await?;

    Ok(row.as_ref().map(decode_record).transpose()?)
}

/// CLI entry point: run one search and print the page.
pub async fn run_search(config: &Config, request: SearchRequest, json: bool) -> anyhow::Result<()> {
    let store = SkillStore::open(config).await?;
    let page = search(&store, &request, config.search.timeout()).await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.records.is_empty() {
        println!("No results. ({} matching)", page.total_matching);
        return Ok(());
    }

    let first = (i64::from(page.page) - 1) * i64::from(page.limit);
    for (i, record) in page.records.iter().enumerate() {
        let name = if record.name.is_empty() {
            "(unnamed)"
        } else {
            record.name.as_str()
        };
        println!(
            "{}. {} / {}  [{} installs]",
            first + i as i64 + 1,
            record.owner.as_deref().unwrap_or("-"),
            name,
            record.installs
        );
        if let Some(description) = &record.description {
            let excerpt: String = description.chars().take(160).collect();
            println!("    {}", excerpt.replace('\n', " ").trim());
        }
        println!("    sources: {}", record.sources.join(", "));
        if let Some(category) = &record.category {
            println!("    category: {}", category);
        }
        println!("    id: {}", record.id);
        println!();
    }

    let pages = (page.total_matching + i64::from(page.limit) - 1) / i64::from(page.limit);
    println!(
        "page {} of {} ({} matching)",
        page.page,
        pages.max(1),
        page.total_matching
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(term: Option<&str>) -> SearchRequest {
        SearchRequest {
            term: term.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_fts_query_quotes_and_prefixes_tokens() {
        assert_eq!(fts_query("react hooks").as_deref(), Some("\"react\"* \"hooks\"*"));
        assert_eq!(fts_query("  foo  ").as_deref(), Some("\"foo\"*"));
    }

    #[test]
    fn test_fts_query_neutralizes_operators() {
        assert_eq!(
            fts_query("a\"b OR NEAR(x)").as_deref(),
            Some("\"a\"\"b\"* \"OR\"* \"NEAR(x)\"*")
        );
    }

    #[test]
    fn test_fts_query_drops_symbol_only_tokens() {
        assert_eq!(fts_query("- * \"").as_deref(), None);
        assert_eq!(fts_query("c++ -").as_deref(), Some("\"c++\"*"));
        assert_eq!(fts_query("   ").as_deref(), None);
    }

    #[test]
    fn test_blank_term_selects_plain_scan() {
        assert!(matches!(
            QueryPlan::for_request(&request(None)),
            QueryPlan::PlainScan { .. }
        ));
        assert!(matches!(
            QueryPlan::for_request(&request(Some(" \t "))),
            QueryPlan::PlainScan { .. }
        ));
        assert!(matches!(
            QueryPlan::for_request(&request(Some("foo"))),
            QueryPlan::TextMatch { .. }
        ));
    }

    #[test]
    fn test_plain_scan_composition() {
        let plan = QueryPlan::PlainScan {
            filters: Filters {
                category: Some("testing".into()),
                source: Some("skillsh".into()),
            },
        };
        let q = plan.compose(20, 40);
        assert!(q.select_sql.contains("FROM skills s WHERE s.category = ? AND instr(s.sources, ?) > 0"));
        assert!(q.select_sql.ends_with("ORDER BY s.installs DESC, s.row_id ASC LIMIT ? OFFSET ?"));
        assert_eq!(
            q.count_sql,
            "SELECT COUNT(*) FROM skills s WHERE s.category = ? AND instr(s.sources, ?) > 0"
        );
        assert_eq!(q.args, vec!["testing".to_string(), "\"skillsh\"".to_string()]);
        assert_eq!((q.limit, q.offset), (20, 40));
    }

    #[test]
    fn test_text_match_composition_binds_match_first() {
        let plan = QueryPlan::TextMatch {
            fts_query: "\"foo\"*".into(),
            filters: Filters {
                category: Some("ui".into()),
                source: None,
            },
        };
        let q = plan.compose(10, 0);
        assert!(q
            .count_sql
            .contains("skills_fts f JOIN skills s ON f.rowid = s.row_id WHERE skills_fts MATCH ? AND s.category = ?"));
        assert_eq!(q.args, vec!["\"foo\"*".to_string(), "ui".to_string()]);
    }

    #[test]
    fn test_unfiltered_scan_has_no_where_clause() {
        let q = QueryPlan::PlainScan {
            filters: Filters::default(),
        }
        .compose(5, 0);
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM skills s");
        assert!(q.args.is_empty());
    }

    #[test]
    fn test_request_normalization() {
        let r = SearchRequest {
            term: None,
            category: Some("  ".into()),
            source: Some("".into()),
            page: 0,
            limit: 1000,
        }
        .normalized();
        assert_eq!(r.page, 1);
        assert_eq!(r.limit, 100);
        assert!(r.category.is_none());
        assert!(r.source.is_none());

        let r = SearchRequest {
            page: 3,
            limit: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(r.limit, 1);
        assert_eq!(r.offset(), 2);
    }
}
