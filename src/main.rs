// Entity Match - CLI
// seed: load an entities JSON file into the database
// match: run a CSV of candidate rows against the seeded entities

use anyhow::{bail, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use entity_match::{summarize, EntityStore, MatchEngine};

const DEFAULT_DB: &str = "entities.db";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => {
            let seed_path = required_arg(&args, 2, "path to entities JSON file")?;
            run_seed(&seed_path, &db_path(&args, 3))
        }
        Some("match") => {
            let csv_path = required_arg(&args, 2, "path to CSV file")?;
            run_match(&csv_path, &db_path(&args, 3)).await
        }
        _ => {
            eprintln!("Usage:");
            eprintln!("  entity-match seed <entities.json> [db]");
            eprintln!("  entity-match match <file.csv> [db]");
            std::process::exit(1);
        }
    }
}

fn required_arg(args: &[String], index: usize, what: &str) -> Result<PathBuf> {
    match args.get(index) {
        Some(value) => Ok(PathBuf::from(value)),
        None => bail!("missing argument: {}", what),
    }
}

fn db_path(args: &[String], index: usize) -> PathBuf {
    args.get(index)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn run_seed(seed_path: &Path, db: &Path) -> Result<()> {
    println!("🌱 Seeding entity database");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut store = EntityStore::open(db)?;
    store.setup()?;
    println!("✓ Database initialized: {:?}", db);

    let report = store.seed_from_json(seed_path)?;
    println!("✓ Seeded {} entities ({} skipped)", report.seeded, report.skipped);

    println!("\n📊 Entity counts:");
    for (table, count) in store.entity_counts()? {
        println!("   {:<24} {}", table, count);
    }

    Ok(())
}

async fn run_match(csv_path: &Path, db: &Path) -> Result<()> {
    println!("🔍 Matching CSV rows against entity database");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !db.exists() {
        eprintln!("❌ Database not found at {:?}", db);
        eprintln!("   Run: entity-match seed <entities.json>");
        std::process::exit(1);
    }

    let rows = entity_match::load_rows(csv_path)?;
    println!("✓ Loaded {} rows from {:?}", rows.len(), csv_path);

    let store = EntityStore::open(db)?;
    let engine = MatchEngine::new(Arc::new(store));

    let total = rows.len();
    let file_name = csv_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let results = engine.resolve_batch(rows).await?;
    let summary = summarize(&results, file_name, total);

    println!("\n📋 Results:");
    for result in &results {
        match &result.best_match {
            Some(best) => println!(
                "   row {:>3}: {} → {} ({})",
                result.index,
                result
                    .extracted
                    .organization_name
                    .as_deref()
                    .or(result.extracted.website_hostname.as_deref())
                    .unwrap_or("-"),
                best.entity.name,
                best.entity_type.as_str(),
            ),
            None => println!("   row {:>3}: no match", result.index),
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✓ {} matched, {} unmatched of {} rows",
        summary.matched, summary.unmatched, summary.total_rows
    );

    Ok(())
}
