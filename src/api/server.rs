// API server implementation using actix-web

use crate::api::auth::{AdminAuth, AuthSettings};
use crate::api::{middleware, routes};
use crate::database_ops::db::Db;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::env;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub auth: AuthSettings,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;

        let secret =
            env::var("AUTH_SECRET").context("AUTH_SECRET environment variable is required")?;
        let admin_username =
            env::var("ADMIN_USERNAME").context("ADMIN_USERNAME environment variable is required")?;
        let admin_password =
            env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD environment variable is required")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            host,
            port,
            auth: AuthSettings {
                secret,
                admin_username,
                admin_password,
            },
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting ai-leaderboard API server"
        );

        let db_data = web::Data::new(db);
        let auth_data = web::Data::new(self.auth.clone());
        let auth_secret = self.auth.secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = AdminAuth::new(auth_secret.clone());

            App::new()
                .app_data(db_data.clone())
                .app_data(auth_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .wrap(auth)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
