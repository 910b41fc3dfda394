pub mod cart;
pub mod order;
pub mod profile;
pub mod review;
pub mod wishlist;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use cart::cart_router;
use order::order_router;
use profile::profile_router;
use review::review_router;
use wishlist::wishlist_router;

pub fn user_api_router(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    Router::new()
        .merge(profile_router(db.clone()))
        .merge(cart_router(db.clone()))
        .merge(order_router(db.clone()))
        .merge(wishlist_router(db.clone()))
        .merge(review_router(db.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                config,
                role: Role::User,
            },
            auth_middleware,
        ))
}
