pub mod admin;
pub mod public;
pub mod user;

use axum::{extract::Extension, middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use admin::admin_api_router;
use public::public_api_router;
use user::user_api_router;

use crate::config::Config;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::middleware::logging::logging_middleware;
use crate::oauth::IdTokenVerifier;

pub fn create_api_router(
    shared_db: Arc<DatabaseConnection>,
    config: Arc<Config>,
    metrics: Arc<Metrics>,
    verifier: Arc<dyn IdTokenVerifier>,
) -> Router {
    let api = Router::new()
        .merge(public_api_router(shared_db.clone()))
        .merge(user_api_router(shared_db.clone(), config.clone()))
        .nest("/admin", admin_api_router(shared_db, config.clone()));

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(Extension(config))
        .layer(Extension(metrics.clone()))
        .layer(Extension(verifier))
        .layer(from_fn_with_state(metrics, logging_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}
