//! # skilldb CLI
//!
//! ## Usage
//!
//! ```bash
//! skilldb --config ./config/skilldb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `skilldb init` | Create the SQLite database and an empty index |
//! | `skilldb build` | Rebuild the index from the configured snapshots |
//! | `skilldb search [term]` | Search the index |
//! | `skilldb get <id>` | Print one record |
//! | `skilldb stats` | Print catalog statistics |
//! | `skilldb serve` | Start the HTTP API |
//! | `skilldb completions <shell>` | Print a shell completion script |

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use skilldb::{config, get, index, logging, migrate, search, server, stats};

/// skilldb: search over an aggregated catalog of skill packages.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`.
#[derive(Parser)]
#[command(name = "skilldb", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/skilldb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and an empty, queryable index. Idempotent.
    Init,

    /// Load the snapshots, normalize and enrich them, and replace the index.
    ///
    /// The rebuild runs in a single transaction: on any failure the
    /// previous index stays in place.
    Build {
        /// Load, merge and validate only; do not touch the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the index. Without a term, lists records by installs.
    Search {
        /// Free-text term matched against name, description, owner and tags.
        term: Option<String>,

        /// Exact category filter.
        #[arg(long)]
        category: Option<String>,

        /// Source tag filter (e.g. `skillsmp`, `skillsh`, `clawhub`).
        #[arg(long)]
        source: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size; defaults to `[search].default_limit`.
        #[arg(long)]
        limit: Option<u32>,

        /// Print the result page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one record by id.
    Get {
        /// Skill id, e.g. `owner/repo/skill`.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Print catalog statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "skilldb", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Build { dry_run } => {
            index::run_build(&cfg, dry_run).await?;
        }
        Commands::Search {
            term,
            category,
            source,
            page,
            limit,
            json,
        } => {
            let request = search::SearchRequest {
                term,
                category,
                source,
                page,
                limit: limit
                    .unwrap_or(cfg.search.default_limit)
                    .min(cfg.search.max_limit),
            };
            search::run_search(&cfg, request, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
