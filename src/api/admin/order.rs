use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::public::auth::UserResponse;
use crate::entities::{
    order::{self, Entity as OrderEntity, Status},
    user,
};
use crate::error::{ApiError, ApiResult};
use crate::orders::{change_status, load_detail};
use crate::utils::page_params;

pub fn admin_order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(patch_status))
        .layer(Extension(db))
}

async fn get_orders(
    Query(params): Query<AdminOrdersQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let (page, limit) = page_params(params.page, params.limit, 20, 100);

    let mut half_result = OrderEntity::find();
    if let Some(status) = params.status.as_deref() {
        let status: Status = status.parse().map_err(ApiError::BadRequest)?;
        half_result = half_result.filter(order::Column::Status.eq(status));
    }
    if let Some(user_id) = params.user_id {
        half_result = half_result.filter(order::Column::UserId.eq(user_id));
    }
    if let Some(number) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        half_result = half_result.filter(order::Column::OrderNumber.contains(number));
    }

    let paginator = half_result
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(&*db, limit);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    let orders = paginator.fetch_page(page - 1).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "orders": orders,
            "page": page,
            "pages": pages,
            "total": total,
        })),
    )
        .into_response())
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let (found, customer) = OrderEntity::find_by_id(id)
        .find_also_related(user::Entity)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No order with {} id was found.", id)))?;
    let detail = load_detail(&*db, found).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "order": detail,
            "customer": customer.map(UserResponse::from),
        })),
    )
        .into_response())
}

async fn patch_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<StatusPayload>,
) -> ApiResult {
    payload.validate()?;
    let next: Status = payload.status.trim().parse().map_err(ApiError::BadRequest)?;

    let txn = db.begin().await?;
    let found = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No order with {} id was found.", id)))?;

    let note = payload.note.filter(|n| !n.trim().is_empty());
    let updated = change_status(&txn, found, next, note).await?;
    let detail = load_detail(&txn, updated).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Order status updated",
            "order": detail,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct AdminOrdersQuery {
    status: Option<String>,
    user_id: Option<i32>,
    search: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Validate)]
struct StatusPayload {
    status: String,
    #[validate(length(max = 500))]
    note: Option<String>,
}
