use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::user::cart::active_product;
use crate::entities::{product, review};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::Claims;

pub fn review_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products/:id/reviews", post(post_review))
        .layer(Extension(db))
}

/// One review per customer and product. The product's rating and review
/// count are recomputed in the same transaction.
async fn post_review(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReviewPayload>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;
    let prod = active_product(&txn, product_id).await?;

    let existing = review::Entity::find()
        .filter(review::Column::ProductId.eq(product_id))
        .filter(review::Column::UserId.eq(claims.user_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("You have already reviewed this product"));
    }

    let model = review::ActiveModel {
        product_id: Set(product_id),
        user_id: Set(claims.user_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.trim().to_owned()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let (rating, num_reviews) = refresh_rating(&txn, prod.id).await?;
    txn.commit().await?;

    info!(product_id, user_id = claims.user_id, rating, "Review added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "review": model,
            "rating": rating,
            "num_reviews": num_reviews,
        })),
    )
        .into_response())
}

/// Recomputes the stored average and count from the product's reviews.
pub(crate) async fn refresh_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
) -> Result<(f64, i32), DbErr> {
    let ratings: Vec<i32> = review::Entity::find()
        .filter(review::Column::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let (rating, num_reviews) = average_rating(&ratings);

    product::Entity::update_many()
        .col_expr(product::Column::Rating, Expr::value(rating))
        .col_expr(product::Column::NumReviews, Expr::value(num_reviews))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok((rating, num_reviews))
}

fn average_rating(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i32 = ratings.iter().sum();
    let count = ratings.len() as i32;
    (f64::from(sum) / f64::from(count), count)
}

#[derive(Deserialize, Validate)]
struct ReviewPayload {
    #[validate(range(min = 1, max = 5))]
    rating: i32,
    #[validate(length(min = 1, max = 1000))]
    comment: String,
}
