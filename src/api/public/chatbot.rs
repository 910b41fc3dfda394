use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::chatbot::{canned_reply, classify, search_terms, Intent};
use crate::config::Config;
use crate::entities::{category, order, product};
use crate::error::ApiResult;
use crate::metrics::Metrics;
use crate::middleware::auth::optional_claims;

pub fn chatbot_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/chatbot/message", post(message))
        .layer(Extension(db))
}

async fn message(
    headers: HeaderMap,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(metrics): Extension<Arc<Metrics>>,
    Json(payload): Json<ChatMessage>,
) -> ApiResult {
    payload.validate()?;
    metrics.chatbot_message();

    let intent = classify(&payload.message);
    debug!(intent = ?intent, "Classified chatbot message");

    let reply = match intent {
        Intent::OrderStatus => match optional_claims(&headers, &config) {
            Some(claims) => latest_order_reply(&db, claims.user_id).await?,
            None => canned_reply(intent),
        },
        Intent::ProductSearch => product_search_reply(&db, &payload.message).await?,
        Intent::Categories => categories_reply(&db).await?,
        Intent::Discounts => discounts_reply(&db).await?,
        _ => canned_reply(intent),
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "intent": intent,
            "reply": reply,
        })),
    )
        .into_response())
}

async fn latest_order_reply(db: &DatabaseConnection, user_id: i32) -> Result<String, sea_orm::DbErr> {
    let latest = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .one(db)
        .await?;

    Ok(match latest {
        Some(latest) => format!(
            "Your latest order {} is {} (total ${:.2}).",
            latest.order_number, latest.status, latest.total
        ),
        None => "You have no orders yet.".to_owned(),
    })
}

async fn product_search_reply(db: &DatabaseConnection, message: &str) -> Result<String, sea_orm::DbErr> {
    let terms = search_terms(message);
    if terms.is_empty() {
        return Ok(canned_reply(Intent::ProductSearch));
    }

    let condition = terms
        .iter()
        .fold(Condition::any(), |cond, term| {
            cond.add(product::Column::Name.contains(term.as_str()))
        });
    let found = product::Entity::find()
        .filter(product::Column::IsActive.eq(true))
        .filter(condition)
        .order_by_desc(product::Column::Stock)
        .limit(3)
        .all(db)
        .await?;

    if found.is_empty() {
        return Ok(format!(
            "I couldn't find products matching \"{}\". Try another name or browse the catalogue.",
            terms.join(" ")
        ));
    }

    let now = Utc::now();
    let listed: Vec<String> = found
        .iter()
        .map(|prod| {
            let availability = if prod.stock > 0 {
                format!("{} in stock", prod.stock)
            } else {
                "out of stock".to_owned()
            };
            format!("{} (${:.2}, {})", prod.name, prod.effective_price(now), availability)
        })
        .collect();
    Ok(format!("Here is what I found: {}.", listed.join("; ")))
}

async fn categories_reply(db: &DatabaseConnection) -> Result<String, sea_orm::DbErr> {
    let names: Vec<String> = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();

    Ok(if names.is_empty() {
        canned_reply(Intent::Categories)
    } else {
        format!("We have these categories: {}.", names.join(", "))
    })
}

async fn discounts_reply(db: &DatabaseConnection) -> Result<String, sea_orm::DbErr> {
    let now = Utc::now();
    let offers = product::Entity::find()
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::DiscountPercentage.is_not_null())
        .filter(product::Column::DiscountStart.lte(now))
        .filter(product::Column::DiscountEnd.gte(now))
        .order_by_desc(product::Column::DiscountPercentage)
        .limit(5)
        .all(db)
        .await?;

    if offers.is_empty() {
        return Ok(canned_reply(Intent::Discounts));
    }

    let listed: Vec<String> = offers
        .iter()
        .map(|prod| {
            format!(
                "{} -{:.0}% (now ${:.2})",
                prod.name,
                prod.discount_percentage.unwrap_or_default(),
                prod.effective_price(now)
            )
        })
        .collect();
    Ok(format!("Current offers: {}.", listed.join("; ")))
}

#[derive(Deserialize, Validate)]
struct ChatMessage {
    #[validate(length(min = 1, max = 500))]
    message: String,
}
