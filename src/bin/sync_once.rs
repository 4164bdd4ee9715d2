// One-shot catalog sync for external schedulers (cron etc.).
// Set SYNC_LOOP_SECS to keep the process running on an interval instead;
// the DB-backed rate-limit claim still applies either way.

use ai_leaderboard::database_ops::artificial_analysis::{SyncEngine, SyncError};
use ai_leaderboard::database_ops::db::Db;
use ai_leaderboard::util::env as env_util;
use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing();

    let database_url = env_util::db_url()?;
    let db = Db::connect(&database_url, 5).await?;
    let engine = SyncEngine::from_env()?;

    let interval_secs: u64 = env_util::env_parse("SYNC_LOOP_SECS", 0u64);
    if interval_secs == 0 {
        // one-shot
        run_once(&engine, &db).await?;
    } else {
        loop {
            if let Err(e) = run_once(&engine, &db).await {
                eprintln!("[sync_once] error: {e:?}");
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    }
    Ok(())
}

async fn run_once(engine: &SyncEngine, db: &Db) -> Result<()> {
    match engine.run(db).await {
        Ok(summary) => {
            println!(
                "[sync_once] updated={} total={} skipped={}",
                summary.updated,
                summary.total,
                summary.skipped.len()
            );
            for skip in &summary.skipped {
                println!(
                    "[sync_once]   skipped id={} name={} reason={}",
                    skip.id, skip.name, skip.reason
                );
            }
            Ok(())
        }
        Err(SyncError::RateLimited { retry_after_secs }) => {
            println!("[sync_once] rate-limited; retry in {retry_after_secs}s");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn init_tracing() {
    let _ = SubscriberBuilder::default()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap_or_else(|_| "info".parse().unwrap())),
        )
        .with_target(false)
        .try_init();
}
