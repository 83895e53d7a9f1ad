//! # skilldb
//!
//! A search index over a static catalog of skill packages aggregated from
//! several upstream sources.
//!
//! Raw per-source snapshots are merged into one canonical record per skill,
//! optionally enriched from a frontmatter snapshot, and loaded into SQLite
//! with an FTS5 text index. Queries combine free text, a category filter
//! and a source filter, and always rank by install count.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐
//! │ Snapshots │──▶│ Normalize  │──▶│  Enrich  │──▶│ Index build  │
//! │  (JSON)   │   │ + merge    │   │          │   │ SQLite+FTS5  │
//! └───────────┘   └────────────┘   └──────────┘   └──────┬───────┘
//!                                                        │
//!                                    ┌───────────────────┤
//!                                    ▼                   ▼
//!                               ┌──────────┐       ┌──────────┐
//!                               │   CLI    │       │   HTTP   │
//!                               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! skilldb init                      # create an empty index
//! skilldb build                     # load snapshots and rebuild
//! skilldb search "react hooks" --source skillsh
//! skilldb serve                     # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Raw and canonical record types |
//! | [`coerce`] | Loosely typed snapshot values |
//! | [`snapshot`] | Reading snapshot files |
//! | [`normalize`] | Raw entries to canonical records |
//! | [`enrich`] | Frontmatter enrichment merge |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`store`] | Store handle and row codec |
//! | [`index`] | Atomic index rebuild |
//! | [`search`] | Query planning and execution |
//! | [`stats`] | Catalog statistics |
//! | [`get`] | Record retrieval for the CLI |
//! | [`server`] | HTTP query surface |

pub mod coerce;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod get;
pub mod index;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod stats;
pub mod store;
