use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::entities::{
    cart,
    order::{self, Entity as OrderEntity, Status},
    order_part, product,
};
use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;
use crate::middleware::auth::Claims;
use crate::orders::{change_status, load_detail, order_number, record_status, reserve_stock};
use crate::pricing::{self, LineItem};
use crate::utils::page_params;

pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders).post(place_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .layer(Extension(db))
}

/// Turns the caller's cart into a pickup order. Everything happens in one
/// transaction: any failing line leaves stock, cart and orders untouched.
async fn place_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(metrics): Extension<Arc<Metrics>>,
    Extension(claims): Extension<Claims>,
    payload: Option<Json<PlaceOrder>>,
) -> ApiResult {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let user_id = claims.user_id;

    let txn = db.begin().await?;

    let rows = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .find_also_related(product::Entity)
        .order_by_asc(cart::Column::Id)
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(ApiError::bad_request("Cart is empty"));
    }

    let mut lines = Vec::with_capacity(rows.len());
    for (entry, prod) in rows {
        let prod = prod.filter(|p| p.is_active).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Product {} is no longer available",
                entry.product_id
            ))
        })?;
        if entry.quantity > prod.stock {
            return Err(ApiError::bad_request(format!(
                "Only {} units of {} are in stock",
                prod.stock.max(0),
                prod.name
            )));
        }
        lines.push((entry, prod));
    }

    let now = Utc::now();
    let items: Vec<LineItem> = lines
        .iter()
        .map(|(entry, prod)| LineItem {
            price: prod.price,
            discount: prod.discount(),
            quantity: entry.quantity,
        })
        .collect();
    let (priced, totals) = pricing::compute_totals(&items, now);

    let new_order = order::ActiveModel {
        order_number: Set(order_number()),
        user_id: Set(Some(user_id)),
        status: Set(Status::Pending),
        subtotal: Set(totals.subtotal),
        tax: Set(totals.tax),
        shipping_cost: Set(totals.shipping_cost),
        total: Set(totals.total),
        contact_phone: Set(payload.contact_phone),
        notes: Set(payload.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for ((_, prod), line) in lines.iter().zip(priced.iter()) {
        order_part::ActiveModel {
            order_id: Set(new_order.id),
            product_id: Set(prod.id),
            product_name: Set(prod.name.clone()),
            unit_price: Set(line.unit_price),
            discount_percentage: Set(line.discount_percentage),
            effective_price: Set(line.effective_price),
            quantity: Set(line.quantity),
            line_total: Set(line.line_total),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !reserve_stock(&txn, prod.id, line.quantity).await? {
            warn!(product_id = prod.id, "Stock changed while placing order");
            return Err(ApiError::bad_request(format!(
                "Not enough stock left for {}",
                prod.name
            )));
        }
    }

    record_status(&txn, new_order.id, Status::Pending, None).await?;

    cart::Entity::delete_many()
        .filter(cart::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    let detail = load_detail(&txn, new_order).await?;
    txn.commit().await?;

    metrics.order_created();
    info!(
        user_id,
        order_number = %detail.order.order_number,
        total = detail.order.total,
        "Order placed"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "order": detail })),
    )
        .into_response())
}

async fn get_orders(
    Query(params): Query<OrdersQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let (page, limit) = page_params(params.page, params.limit, 10, 50);

    let paginator = OrderEntity::find()
        .filter(order::Column::UserId.eq(claims.user_id))
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
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let found = own_order(&db, id, claims.user_id).await?;
    let detail = load_detail(&*db, found).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "order": detail })),
    )
        .into_response())
}

async fn cancel_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let txn = db.begin().await?;

    let found = OrderEntity::find_by_id(id)
        .filter(order::Column::UserId.eq(claims.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No order with {} id was found.", id)))?;

    if found.status != Status::Pending {
        return Err(ApiError::conflict(format!(
            "Only pending orders can be cancelled, this one is {}",
            found.status
        )));
    }

    let updated = change_status(
        &txn,
        found,
        Status::Cancelled,
        Some("Cancelled by customer".to_owned()),
    )
    .await?;
    let detail = load_detail(&txn, updated).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "order": detail })),
    )
        .into_response())
}

async fn own_order(
    db: &DatabaseConnection,
    id: i32,
    user_id: i32,
) -> Result<order::Model, ApiError> {
    OrderEntity::find_by_id(id)
        .filter(order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No order with {} id was found.", id)))
}

#[derive(Deserialize, Validate, Default)]
struct PlaceOrder {
    #[validate(length(min = 5, max = 32))]
    contact_phone: Option<String>,
    #[validate(length(max = 500))]
    notes: Option<String>,
}

#[derive(Deserialize)]
struct OrdersQuery {
    page: Option<u64>,
    limit: Option<u64>,
}
