// HTTP API server binary for the AI model leaderboard

use ai_leaderboard::api::ApiServer;
use ai_leaderboard::database_ops::db::Db;
use ai_leaderboard::util::env as env_util;
use anyhow::Result;

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    tracing::info!("Initializing ai-leaderboard API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    env_util::preflight_check(
        "api_server",
        &["AUTH_SECRET", "ADMIN_USERNAME", "ADMIN_PASSWORD"],
        &[
            "API_HOST",
            "API_PORT",
            "ALLOWED_ORIGINS",
            "SUPABASE_DB_URL",
            "DATABASE_URL",
            "ARTIFICIAL_ANALYSIS_API_KEY",
        ],
    )?;

    // Load configuration from environment
    let server = ApiServer::from_env()?;

    // Initialize database connection
    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;

    tracing::info!("Database connected successfully");

    // Start HTTP server
    server.run(db).await?;

    Ok(())
}
