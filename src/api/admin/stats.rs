//! Dashboard figures for the back office.

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Iterable, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    category,
    order::{self, Status},
    order_part, product, user,
};
use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;

const LOW_STOCK_THRESHOLD: i32 = 10;
const REVENUE_MONTHS: u32 = 6;

pub fn stats_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .layer(Extension(db))
}

async fn get_stats(Extension(db): Extension<Arc<DatabaseConnection>>) -> ApiResult {
    let users = user::Entity::find().count(&*db).await?;
    let products = product::Entity::find()
        .filter(product::Column::IsActive.eq(true))
        .count(&*db)
        .await?;
    let categories = category::Entity::find().count(&*db).await?;
    let orders = order::Entity::find().count(&*db).await?;

    let revenue: Option<f64> = order::Entity::find()
        .select_only()
        .column_as(order::Column::Total.sum(), "revenue")
        .filter(order::Column::Status.ne(Status::Cancelled))
        .into_tuple::<Option<f64>>()
        .one(&*db)
        .await?
        .flatten();

    let grouped: Vec<(Status, i64)> = order::Entity::find()
        .select_only()
        .column(order::Column::Status)
        .column_as(order::Column::Id.count(), "count")
        .group_by(order::Column::Status)
        .into_tuple()
        .all(&*db)
        .await?;
    let mut by_status = serde_json::Map::new();
    for status in Status::iter() {
        let count = grouped
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, count)| *count);
        by_status.insert(status.as_str().to_owned(), json!(count));
    }

    let low_stock = product::Entity::find()
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::Stock.lte(LOW_STOCK_THRESHOLD))
        .order_by_asc(product::Column::Stock)
        .order_by_asc(product::Column::Name)
        .limit(20)
        .all(&*db)
        .await?;

    let recent_orders = order::Entity::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .limit(5)
        .all(&*db)
        .await?;

    let top_products = order_part::Entity::find()
        .select_only()
        .column(order_part::Column::ProductId)
        .column_as(order_part::Column::ProductName.max(), "product_name")
        .column_as(order_part::Column::Quantity.sum(), "units_sold")
        .column_as(order_part::Column::LineTotal.sum(), "revenue")
        .inner_join(order::Entity)
        .filter(order::Column::Status.ne(Status::Cancelled))
        .group_by(order_part::Column::ProductId)
        .order_by_desc(order_part::Column::Quantity.sum())
        .limit(5)
        .into_model::<TopProduct>()
        .all(&*db)
        .await?;

    let monthly_revenue = monthly_revenue(&db, Utc::now()).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "stats": {
                "users": users,
                "products": products,
                "categories": categories,
                "orders": orders,
                "revenue": revenue.unwrap_or(0.0),
                "orders_by_status": by_status,
                "low_stock": low_stock,
                "recent_orders": recent_orders,
                "top_products": top_products,
                "monthly_revenue": monthly_revenue,
            }
        })),
    )
        .into_response())
}

async fn get_metrics(Extension(metrics): Extension<Arc<Metrics>>) -> ApiResult {
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "metrics": metrics.snapshot() })),
    )
        .into_response())
}

/// Revenue of non-cancelled orders for the current month and the five
/// before it, oldest first. Months without orders report zero.
async fn monthly_revenue(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<MonthRevenue>, ApiError> {
    let months = last_months(now, REVENUE_MONTHS);
    let (first_year, first_month) = months[0];
    let window_start = Utc
        .with_ymd_and_hms(first_year, first_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ApiError::Internal("Invalid revenue window start".to_owned()))?;

    let rows: Vec<(DateTime<Utc>, f64)> = order::Entity::find()
        .select_only()
        .column(order::Column::CreatedAt)
        .column(order::Column::Total)
        .filter(order::Column::Status.ne(Status::Cancelled))
        .filter(order::Column::CreatedAt.gte(window_start))
        .into_tuple()
        .all(db)
        .await?;

    Ok(bucket_by_month(&months, &rows))
}

/// `(year, month)` pairs ending with the month of `now`, oldest first.
fn last_months(now: DateTime<Utc>, count: u32) -> Vec<(i32, u32)> {
    let (mut year, mut month) = (now.year(), now.month());
    let mut months = Vec::with_capacity(count as usize);
    for _ in 0..count {
        months.push((year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    months.reverse();
    months
}

fn bucket_by_month(months: &[(i32, u32)], rows: &[(DateTime<Utc>, f64)]) -> Vec<MonthRevenue> {
    months
        .iter()
        .map(|&(year, month)| {
            let in_month = rows
                .iter()
                .filter(|(at, _)| at.year() == year && at.month() == month);
            MonthRevenue {
                month: format!("{year:04}-{month:02}"),
                orders: in_month.clone().count(),
                revenue: in_month.map(|(_, total)| total).sum(),
            }
        })
        .collect()
}

#[derive(Debug, FromQueryResult, Serialize)]
struct TopProduct {
    product_id: i32,
    product_name: String,
    units_sold: i64,
    revenue: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct MonthRevenue {
    month: String,
    orders: usize,
    revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_wrap_around_new_year() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap();
        assert_eq!(
            last_months(now, 6),
            vec![(2025, 9), (2025, 10), (2025, 11), (2025, 12), (2026, 1), (2026, 2)]
        );
    }

    #[test]
    fn revenue_is_bucketed_and_zero_filled() {
        let months = vec![(2026, 1), (2026, 2), (2026, 3)];
        let rows = vec![
            (Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 0).unwrap(), 10.0),
            (Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(), 4.5),
            (Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap(), 5.5),
        ];
        let buckets = bucket_by_month(&months, &rows);

        assert_eq!(buckets[0].month, "2026-01");
        assert_eq!(buckets[0].revenue, 10.0);
        assert_eq!(buckets[1].orders, 0);
        assert_eq!(buckets[1].revenue, 0.0);
        assert_eq!(buckets[2].orders, 2);
        assert_eq!(buckets[2].revenue, 10.0);
    }
}
