//! Order bookkeeping shared by the customer and admin routes.

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::info;

use crate::entities::{
    order::{self, Status},
    order_part, order_status, product,
};
use crate::error::ApiError;

/// "ORD-20260315-K3X9QZ"
pub fn order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

#[derive(Serialize, Debug)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_part::Model>,
    pub history: Vec<order_status::Model>,
}

pub async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
) -> Result<OrderDetail, DbErr> {
    let items = order
        .find_related(order_part::Entity)
        .order_by_asc(order_part::Column::Id)
        .all(conn)
        .await?;
    let history = order
        .find_related(order_status::Entity)
        .order_by_asc(order_status::Column::ChangedAt)
        .order_by_asc(order_status::Column::Id)
        .all(conn)
        .await?;

    Ok(OrderDetail {
        order,
        items,
        history,
    })
}

pub async fn record_status<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    status: Status,
    note: Option<String>,
) -> Result<(), DbErr> {
    order_status::ActiveModel {
        order_id: Set(order_id),
        status: Set(status),
        note: Set(note),
        changed_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Takes `quantity` units out of stock, only if that many are left.
/// Returns false when the product does not have enough units.
pub async fn reserve_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    quantity: i32,
) -> Result<bool, DbErr> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn restore_stock<C: ConnectionTrait>(conn: &C, order_id: i32) -> Result<(), DbErr> {
    let parts = order_part::Entity::find()
        .filter(order_part::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;

    for part in parts {
        product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(part.quantity),
            )
            .filter(product::Column::Id.eq(part.product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// Moves an order to `next`, appending to its history. Entering `cancelled`
/// puts the reserved units back on the shelf; a cancelled order is final.
pub async fn change_status<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
    next: Status,
    note: Option<String>,
) -> Result<order::Model, ApiError> {
    if order.status == Status::Cancelled && next != Status::Cancelled {
        return Err(ApiError::conflict("Cancelled orders cannot be reopened"));
    }

    let order_id = order.id;
    let previous = order.status;
    // Re-setting the current status only adds a history entry.
    if next == Status::Cancelled && previous != Status::Cancelled {
        restore_stock(conn, order_id).await?;
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now());
    let updated = active.update(conn).await?;

    record_status(conn, order_id, next, note).await?;
    info!(order_id, from = %previous, to = %next, "Order status changed");

    Ok(updated)
}
