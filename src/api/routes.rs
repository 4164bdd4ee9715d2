// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                // Public leaderboard reads
                .route("/models", web::get().to(handlers::list_models))
                .route("/models/export", web::get().to(handlers::export_models_csv))
                .route("/models/{id}", web::get().to(handlers::get_model))
                .route("/companies", web::get().to(handlers::list_companies))
                // Session
                .route("/auth/login", web::post().to(handlers::login))
                // Admin surface (JWT-gated by AdminAuth middleware)
                .service(
                    web::scope("/admin")
                        .route("/models", web::post().to(handlers::add_model))
                        .route("/sync", web::post().to(handlers::trigger_sync)),
                ),
        );
}
