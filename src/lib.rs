pub mod api;
pub mod chatbot;
pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod oauth;
pub mod orders;
pub mod pricing;
pub mod utils;

use axum::Router;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::create_api_router;
use crate::config::Config;
use crate::entities::{seed_admin, setup_schema};
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::oauth::{DisabledVerifier, GoogleTokenInfo, IdTokenVerifier};

/// Connects to the database, prepares schema, seed data and the upload
/// directory, and returns the application router.
pub async fn build_app(config: Config) -> Result<Router, ApiError> {
    let verifier: Arc<dyn IdTokenVerifier> = match &config.google_client_id {
        Some(client_id) => Arc::new(GoogleTokenInfo::new(client_id.clone())),
        None => {
            warn!("GOOGLE_CLIENT_ID not set, Google sign-in is disabled");
            Arc::new(DisabledVerifier)
        }
    };
    build_app_with_verifier(config, verifier).await
}

pub async fn build_app_with_verifier(
    config: Config,
    verifier: Arc<dyn IdTokenVerifier>,
) -> Result<Router, ApiError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    setup_schema(&db).await?;
    seed_admin(&db, &config).await?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|err| {
            ApiError::Internal(format!(
                "Failed to create upload directory {}: {err}",
                config.upload_dir.display()
            ))
        })?;
    info!(upload_dir = %config.upload_dir.display(), "Storage ready");

    Ok(create_api_router(
        Arc::new(db),
        Arc::new(config),
        Arc::new(Metrics::default()),
        verifier,
    ))
}
