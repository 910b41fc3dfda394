use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::public::product::ProductResponse;
use crate::api::user::cart::active_product;
use crate::entities::{product, wishlist};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;

pub fn wishlist_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/wishlist", get(get_wishlist).post(add_to_wishlist))
        .route("/wishlist/:product_id", delete(remove_from_wishlist))
        .layer(Extension(db))
}

async fn get_wishlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let now = Utc::now();
    // soft-deleted products drop out of the list but the entry is kept
    let products: Vec<ProductResponse> = wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(claims.user_id))
        .find_also_related(product::Entity)
        .order_by_desc(wishlist::Column::CreatedAt)
        .all(&*db)
        .await?
        .into_iter()
        .filter_map(|(_, prod)| prod.filter(|p| p.is_active))
        .map(|prod| ProductResponse::new(prod, now))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "products": products })),
    )
        .into_response())
}

async fn add_to_wishlist(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<WishlistPayload>,
) -> ApiResult {
    let txn = db.begin().await?;
    active_product(&txn, payload.product_id).await?;

    let existing = wishlist::Entity::find()
        .filter(wishlist::Column::UserId.eq(claims.user_id))
        .filter(wishlist::Column::ProductId.eq(payload.product_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Product is already in the wishlist"));
    }

    wishlist::ActiveModel {
        user_id: Set(claims.user_id),
        product_id: Set(payload.product_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Added successfully" })),
    )
        .into_response())
}

async fn remove_from_wishlist(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let result = wishlist::Entity::delete_many()
        .filter(wishlist::Column::UserId.eq(claims.user_id))
        .filter(wishlist::Column::ProductId.eq(product_id))
        .exec(&*db)
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::not_found(format!(
            "Product {} is not in the wishlist",
            product_id
        )));
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct WishlistPayload {
    product_id: i32,
}
