pub mod category;
pub mod order;
pub mod product;
pub mod stats;
pub mod upload;
pub mod user;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use category::admin_category_router;
use order::admin_order_router;
use product::admin_product_router;
use stats::stats_router;
use upload::upload_router;
use user::admin_user_router;

use crate::config::Config;
use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};

pub fn admin_api_router(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    let admin_category_router = admin_category_router(db.clone());
    let admin_product_router = admin_product_router(db.clone());
    let admin_order_router = admin_order_router(db.clone());
    let admin_user_router = admin_user_router(db.clone());
    let upload_router = upload_router(db.clone(), config.file_size_limit);
    let stats_router = stats_router(db.clone());

    Router::new()
        .merge(stats_router)
        .merge(admin_user_router)
        .merge(admin_product_router)
        .merge(admin_category_router)
        .merge(admin_order_router)
        .merge(upload_router)
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                config,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}
