//! Index schema.
//!
//! `skills` holds one row per canonical record. `row_id` is the stable row
//! reference that `skills_fts` (an external-content FTS5 table over name,
//! description, owner and tags) links back through. `build_info` keeps a
//! single row describing the last successful build.

use sqlx::SqliteConnection;

use crate::config::Config;
use crate::db;
use crate::error::Result;

const CREATE_SKILLS: &str = r#"
    CREATE TABLE IF NOT EXISTS skills (
        row_id INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        description TEXT,
        owner TEXT,
        repo TEXT,
        skill_name TEXT,
        skill_path TEXT,
        github_url TEXT,
        skill_url TEXT,
        sources TEXT NOT NULL DEFAULT '[]',
        installs INTEGER NOT NULL DEFAULT 0 CHECK (installs >= 0),
        license TEXT,
        version TEXT,
        published_at INTEGER,
        category TEXT,
        tags TEXT,
        body_length INTEGER,
        file_size INTEGER,
        quality_score REAL
    )
"#;

const CREATE_FTS: &str = r#"
    CREATE VIRTUAL TABLE skills_fts USING fts5(
        name,
        description,
        owner,
        tags,
        content=skills,
        content_rowid=row_id
    )
"#;

const CREATE_BUILD_INFO: &str = r#"
    CREATE TABLE IF NOT EXISTS build_info (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        built_at INTEGER NOT NULL,
        record_count INTEGER NOT NULL,
        snapshot_sha256 TEXT NOT NULL
    )
"#;

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_skills_installs ON skills(installs DESC)",
    "CREATE INDEX IF NOT EXISTS idx_skills_owner ON skills(owner)",
    "CREATE INDEX IF NOT EXISTS idx_skills_category ON skills(category)",
];

/// Create any missing schema objects. Idempotent.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_SKILLS).execute(&mut *conn).await?;

    // Virtual tables are checked explicitly rather than relying on IF NOT EXISTS
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='skills_fts'",
    )
    .fetch_one(&mut *conn)
    .await?;

    if !fts_exists {
        sqlx::query(CREATE_FTS).execute(&mut *conn).await?;
    }

    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }

    sqlx::query(CREATE_BUILD_INFO).execute(&mut *conn).await?;
    Ok(())
}

/// Drop the record and text-index tables. Used inside the rebuild
/// transaction only.
pub async fn drop_schema(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS skills_fts")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS skills")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// `skilldb init`: make sure an (empty) queryable schema exists.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut conn = pool.acquire().await?;
    create_schema(&mut conn).await?;
    drop(conn);
    pool.close().await;
    Ok(())
}
