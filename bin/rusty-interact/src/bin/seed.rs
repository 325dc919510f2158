//! # Article Seeder
//!
//! Loads a JSON article export from the publishing system into the
//! interaction store, so likes and favorites can resolve their articles.
//!
//! Usage: `seed <articles.json>` (reads `DATABASE_URL`, like the server).

use anyhow::Context;
use ri_db_sqlite::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let path = std::env::args().nth(1).context("usage: seed <articles.json>")?;
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:rusty_interact.db".to_string());

    let store = SqliteStore::new(&database_url).await?;
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let count = store.import_articles_json(&json).await?;
    println!("seeded {count} articles into {database_url}");
    Ok(())
}
