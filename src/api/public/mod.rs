pub mod auth;
pub mod category;
pub mod chatbot;
pub mod product;
pub mod uploads;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

use auth::auth_router;
use category::category_router;
use chatbot::chatbot_router;
use product::product_router;
use uploads::uploads_router;

pub fn public_api_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_router(db.clone()))
        .merge(category_router(db.clone()))
        .merge(product_router(db.clone()))
        .merge(uploads_router(db.clone()))
        .merge(chatbot_router(db))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "success": true, "status": "ok" })))
}
