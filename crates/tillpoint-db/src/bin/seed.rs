//! # Catalog Seeder
//!
//! Populates a database with the demo café catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tillpoint_dev.db if it is empty
//! cargo run -p tillpoint-db --bin seed
//!
//! # Only the first 5 products, replacing existing rows with the same ids
//! cargo run -p tillpoint-db --bin seed -- --count 5 --force
//!
//! # Specify database path
//! cargo run -p tillpoint-db --bin seed -- --db ./data/tillpoint.db
//! ```
//!
//! Runs the full startup sequence (schema, migrations, indexes) first, so it
//! also works on a fresh file.

use std::path::PathBuf;

use clap::Parser;
use tillpoint_db::{default_catalog, DbConfig, InitOptions, Initializer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Tillpoint demo catalog seeder")]
struct Args {
    /// Database file path
    #[arg(short, long, env = "TILLPOINT_DB_PATH", default_value = "./tillpoint_dev.db")]
    db: PathBuf,

    /// Upsert even if the catalog already has products
    #[arg(short, long)]
    force: bool,

    /// Seed only the first N catalog entries
    #[arg(short, long)]
    count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut catalog = default_catalog();
    if let Some(count) = args.count {
        catalog.truncate(count);
    }

    println!("🌱 Tillpoint Catalog Seeder");
    println!("===========================");
    println!("Database: {}", args.db.display());
    println!("Products: {}", catalog.len());
    println!("Force:    {}", args.force);
    println!();

    let start = std::time::Instant::now();
    let options = InitOptions::new(DbConfig::new(&args.db)).with_seed(catalog, args.force);
    let init = Initializer::new(options);
    let db = init.initialize().await?;

    let report = init.report().cloned().unwrap_or_default();
    println!("✓ Connected to database");
    println!("✓ Migrations applied: {}", report.migrations_applied);
    if !report.indexes.is_complete() {
        println!("⚠ {} index(es) failed:", report.indexes.failed());
        for failure in &report.indexes.failures {
            println!("  {failure}");
        }
    }

    if report.seeded == 0 {
        println!("⚠ Database already has {} products", report.products);
        println!("  Skipping seed. Pass --force to overwrite matching ids.");
    } else {
        println!("✓ Seeded {} products in {:?}", report.seeded, start.elapsed());
    }

    println!();
    for category in db.products().categories().await? {
        println!("  {:<12} {}", category.category, category.count);
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");
    Ok(())
}
