//! TOML configuration.
//!
//! A single `skilldb.toml` drives every command: where the index lives,
//! which snapshot files feed a rebuild, how the build is batched and
//! self-tested, the search defaults, and the HTTP bind address.
//!
//! ```toml
//! [db]
//! path = "./data/skilldb.sqlite"
//!
//! [snapshot]
//! enrichment = "./data/skills-frontmatter.json"
//!
//! [[snapshot.sources]]
//! tag = "skillsmp"
//! path = "./data/skillsmp.json"
//!
//! [build]
//! batch_size = 200
//! self_test_term = "react"
//!
//! [search]
//! default_limit = 20
//! max_limit = 100
//! timeout_ms = 5000
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling on page size, independent of configuration.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Columns bound per inserted record.
pub const INSERT_COLUMNS: usize = 19;

/// Largest insert batch that fits SQLite's 32766 bind-variable limit.
pub const MAX_BATCH_SIZE: usize = 32766 / INSERT_COLUMNS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub sources: Vec<SourceSnapshotConfig>,
    #[serde(default)]
    pub enrichment: Option<PathBuf>,
    #[serde(default = "default_skill_url_prefix")]
    pub skill_url_prefix: String,
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            enrichment: None,
            skill_url_prefix: default_skill_url_prefix(),
            description_max_chars: default_description_max_chars(),
        }
    }
}

/// One raw snapshot file. `tag` is applied to entries that carry no
/// provenance of their own.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceSnapshotConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_skill_url_prefix() -> String {
    "https://skillsmp.com/skills/".to_string()
}
fn default_description_max_chars() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_self_test_term")]
    pub self_test_term: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            self_test_term: default_self_test_term(),
        }
    }
}

fn default_batch_size() -> usize {
    200
}
fn default_self_test_term() -> String {
    "react".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_limit() -> u32 {
    20
}
fn default_max_limit() -> u32 {
    MAX_PAGE_LIMIT
}
fn default_timeout_ms() -> u64 {
    5000
}

impl SearchConfig {
    /// Per-query deadline; `None` when `timeout_ms = 0`.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.build.batch_size == 0 {
        anyhow::bail!("build.batch_size must be > 0");
    }

    if config.build.batch_size > MAX_BATCH_SIZE {
        anyhow::bail!(
            "build.batch_size must be <= {} ({} bound columns per record)",
            MAX_BATCH_SIZE,
            INSERT_COLUMNS
        );
    }

    if config.build.self_test_term.trim().is_empty() {
        anyhow::bail!("build.self_test_term must not be empty");
    }

    if config.snapshot.description_max_chars == 0 {
        anyhow::bail!("snapshot.description_max_chars must be > 0");
    }

    if !(1..=MAX_PAGE_LIMIT).contains(&config.search.max_limit) {
        anyhow::bail!("search.max_limit must be in [1, {}]", MAX_PAGE_LIMIT);
    }

    if config.search.default_limit < 1 || config.search.default_limit > config.search.max_limit {
        anyhow::bail!(
            "search.default_limit must be in [1, {}]",
            config.search.max_limit
        );
    }

    for source in &config.snapshot.sources {
        if let Some(tag) = &source.tag {
            if tag.trim().is_empty() {
                anyhow::bail!(
                    "snapshot source tag for {} must not be empty",
                    source.path.display()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[db]
path = "/tmp/skilldb.sqlite"

[server]
bind = "127.0.0.1:7340"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse(MINIMAL).unwrap();
        assert_eq!(cfg.build.batch_size, 200);
        assert_eq!(cfg.build.self_test_term, "react");
        assert_eq!(cfg.search.default_limit, 20);
        assert_eq!(cfg.search.max_limit, 100);
        assert_eq!(cfg.snapshot.description_max_chars, 2000);
        assert_eq!(cfg.snapshot.skill_url_prefix, "https://skillsmp.com/skills/");
        assert!(cfg.snapshot.sources.is_empty());
        assert_eq!(cfg.search.timeout(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_snapshot_sources_parse() {
        let src = format!(
            "{}\n[[snapshot.sources]]\ntag = \"skillsh\"\npath = \"a.json\"\n\n[[snapshot.sources]]\npath = \"b.json\"\n",
            MINIMAL
        );
        let cfg = parse(&src).unwrap();
        assert_eq!(cfg.snapshot.sources.len(), 2);
        assert_eq!(cfg.snapshot.sources[0].tag.as_deref(), Some("skillsh"));
        assert!(cfg.snapshot.sources[1].tag.is_none());
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let src = format!("{}\n[search]\ntimeout_ms = 0\n", MINIMAL);
        let cfg = parse(&src).unwrap();
        assert!(cfg.search.timeout().is_none());
    }

    #[test]
    fn test_rejects_max_limit_above_ceiling() {
        let src = format!("{}\n[search]\nmax_limit = 500\n", MINIMAL);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("max_limit"));
    }

    #[test]
    fn test_rejects_default_limit_above_max() {
        let src = format!("{}\n[search]\nmax_limit = 10\ndefault_limit = 20\n", MINIMAL);
        assert!(parse(&src).is_err());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let src = format!("{}\n[build]\nbatch_size = 0\n", MINIMAL);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_rejects_batch_size_over_bind_limit() {
        let src = format!("{}\n[build]\nbatch_size = 2000\n", MINIMAL);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("batch_size must be <= 1724"));

        let src = format!("{}\n[build]\nbatch_size = {}\n", MINIMAL, MAX_BATCH_SIZE);
        assert!(parse(&src).is_ok());
    }
}
