use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::entities::{cart, cart::Entity as CartEntity, product};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;
use crate::pricing::{self, LineItem, OrderTotals};

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product).delete(clear_cart))
        .route("/cart/:product_id", patch(patch_entry).delete(remove_product))
        .layer(Extension(db))
}

async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let view = load_cart(&*db, claims.user_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "items": view.items,
            "summary": view.summary,
        })),
    )
        .into_response())
}

async fn add_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddProduct>,
) -> ApiResult {
    payload.validate()?;
    let user_id = claims.user_id;
    let txn = db.begin().await?;

    let prod = active_product(&txn, payload.product_id).await?;

    let existing = CartEntity::find()
        .filter(cart::Column::ProductId.eq(payload.product_id))
        .filter(cart::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;

    // If the entry already exists it grows instead of a second row appearing.
    let wanted = existing.as_ref().map_or(0, |entry| entry.quantity) + payload.quantity;
    ensure_stock(&prod, wanted)?;

    let (status, message) = match existing {
        Some(entry) => {
            let mut entry: cart::ActiveModel = entry.into();
            entry.quantity = Set(wanted);
            entry.update(&txn).await?;
            (StatusCode::OK, "Cart entry updated")
        }
        None => {
            let new_entry = cart::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(payload.product_id),
                quantity: Set(wanted),
                ..Default::default()
            };
            new_entry.insert(&txn).await?;
            (StatusCode::CREATED, "Added successfully")
        }
    };
    txn.commit().await?;
    debug!(user_id, product_id = payload.product_id, quantity = wanted, "Cart entry saved");

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "product_id": payload.product_id,
            "quantity": wanted,
        })),
    )
        .into_response())
}

async fn patch_entry(
    Path(product_id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCart>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;

    let entry = find_entry(&txn, claims.user_id, product_id).await?;

    let message = if payload.quantity == 0 {
        entry.delete(&txn).await?;
        "Resource deleted successfully"
    } else {
        let prod = active_product(&txn, product_id).await?;
        ensure_stock(&prod, payload.quantity)?;
        let mut entry: cart::ActiveModel = entry.into();
        entry.quantity = Set(payload.quantity);
        entry.update(&txn).await?;
        "Resource patched successfully"
    };
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    )
        .into_response())
}

async fn remove_product(
    Path(product_id): Path<i32>,
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let txn = db.begin().await?;
    let entry = find_entry(&txn, claims.user_id, product_id).await?;
    entry.delete(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

async fn clear_cart(
    Extension(claims): Extension<Claims>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let result = CartEntity::delete_many()
        .filter(cart::Column::UserId.eq(claims.user_id))
        .exec(&*db)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Cart cleared",
            "removed": result.rows_affected,
        })),
    )
        .into_response())
}

//utilities
async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_id: i32,
) -> Result<cart::Model, ApiError> {
    CartEntity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .filter(cart::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("No cart entry for product {} was found.", product_id))
        })
}

pub(crate) async fn active_product<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
) -> Result<product::Model, ApiError> {
    product::Entity::find_by_id(product_id)
        .filter(product::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No product with {} id was found", product_id)))
}

pub(crate) fn ensure_stock(prod: &product::Model, quantity: i32) -> Result<(), ApiError> {
    if quantity > prod.stock {
        return Err(ApiError::bad_request(format!(
            "Only {} units of {} are in stock",
            prod.stock.max(0),
            prod.name
        )));
    }
    Ok(())
}

/// Cart entries joined with their products. Entries whose product is gone
/// or inactive are returned flagged and left out of the summary.
pub(crate) async fn load_cart<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<CartView, DbErr> {
    let rows = CartEntity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .find_also_related(product::Entity)
        .order_by_asc(cart::Column::Id)
        .all(conn)
        .await?;

    let now = Utc::now();
    let mut items = Vec::with_capacity(rows.len());
    let mut priced = Vec::with_capacity(rows.len());

    for (entry, prod) in rows {
        match prod.filter(|p| p.is_active) {
            Some(prod) => {
                let line = LineItem {
                    price: prod.price,
                    discount: prod.discount(),
                    quantity: entry.quantity,
                }
                .price_at(now);
                priced.push(line);
                items.push(CartItem {
                    product_id: entry.product_id,
                    name: Some(prod.name),
                    image_id: prod.image_id,
                    stock: prod.stock,
                    quantity: entry.quantity,
                    available: true,
                    exceeds_stock: entry.quantity > prod.stock,
                    unit_price: Some(line.unit_price),
                    discount_percentage: Some(line.discount_percentage),
                    effective_price: Some(line.effective_price),
                    line_total: Some(line.line_total),
                });
            }
            None => items.push(CartItem {
                product_id: entry.product_id,
                name: None,
                image_id: None,
                stock: 0,
                quantity: entry.quantity,
                available: false,
                exceeds_stock: true,
                unit_price: None,
                discount_percentage: None,
                effective_price: None,
                line_total: None,
            }),
        }
    }

    Ok(CartView {
        items,
        summary: pricing::totals(&priced),
    })
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct AddProduct {
    product_id: i32,
    #[validate(range(min = 1, max = 999))]
    quantity: i32,
}

#[derive(Deserialize, Validate)]
struct PatchCart {
    #[validate(range(min = 0, max = 999))]
    quantity: i32,
}

#[derive(Serialize, Debug)]
pub(crate) struct CartItem {
    pub product_id: i32,
    pub name: Option<String>,
    pub image_id: Option<i32>,
    pub stock: i32,
    pub quantity: i32,
    pub available: bool,
    pub exceeds_stock: bool,
    pub unit_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub effective_price: Option<f64>,
    pub line_total: Option<f64>,
}

#[derive(Debug)]
pub(crate) struct CartView {
    pub items: Vec<CartItem>,
    pub summary: OrderTotals,
}
