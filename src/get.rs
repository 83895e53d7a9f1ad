//! Record retrieval by id.
//!
//! Used by the `skilldb get` CLI command. The HTTP server calls
//! [`crate::search::get_by_id`] directly.

use anyhow::Result;

use crate::config::Config;
use crate::search::get_by_id;
use crate::stats::format_ts_iso;
use crate::store::SkillStore;

/// CLI entry point: print one record, or exit with status 1 when the id is
/// unknown.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let store = SkillStore::open(config).await?;
    let record = get_by_id(&store, id).await?;
    store.close().await;

    let record = match record {
        Some(r) => r,
        None => {
            eprintln!("Error: skill not found: {}", id);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Skill ---");
    println!("id:           {}", record.id);
    println!(
        "name:         {}",
        if record.name.is_empty() {
            "(unnamed)"
        } else {
            record.name.as_str()
        }
    );
    let optional = [
        ("owner", &record.owner),
        ("repo", &record.repo),
        ("skill_name", &record.skill_name),
        ("skill_path", &record.skill_path),
        ("github_url", &record.github_url),
        ("skill_url", &record.skill_url),
        ("license", &record.license),
        ("version", &record.version),
        ("category", &record.category),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("{:<14}{}", format!("{}:", label), value);
        }
    }
    println!("sources:      {}", record.sources.join(", "));
    println!("installs:     {}", record.installs);
    if let Some(ts) = record.published_at {
        println!("published_at: {}", format_ts_iso(ts / 1000));
    }
    if let Some(tags) = &record.tags {
        println!("tags:         {}", tags.join(", "));
    }
    if let Some(n) = record.body_length {
        println!("body_length:  {}", n);
    }
    if let Some(n) = record.file_size {
        println!("file_size:    {}", n);
    }
    if let Some(q) = record.quality_score {
        println!("quality:      {:.2}", q);
    }

    if let Some(description) = &record.description {
        println!();
        println!("--- Description ---");
        println!("{}", description);
    }

    Ok(())
}
