use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    category,
    product::{self, Entity as ProductEntity},
    review, user,
};
use crate::error::{ApiError, ApiResult};
use crate::utils::page_params;

pub fn product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/:id", get(get_product))
        .layer(Extension(db))
}

async fn get_products(
    Query(params): Query<GetProductsQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let (page, limit) = page_params(params.page, params.limit, 12, 100);

    let mut half_result = ProductEntity::find().filter(product::Column::IsActive.eq(true));

    if let Some(category_id) = params.category {
        // direct subcategories are listed with their parent
        let mut ids: Vec<i32> = category::Entity::find()
            .filter(category::Column::ParentId.eq(category_id))
            .all(&*db)
            .await?
            .into_iter()
            .map(|child| child.id)
            .collect();
        ids.push(category_id);
        half_result = half_result.filter(product::Column::CategoryId.is_in(ids));
    }

    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        half_result = half_result.filter(
            Condition::any()
                .add(product::Column::Name.contains(search))
                .add(product::Column::Brand.contains(search))
                .add(product::Column::Description.contains(search)),
        );
    }

    if Some(true) == params.featured {
        half_result = half_result.filter(product::Column::IsFeatured.eq(true));
    }

    if Some(true) == params.in_stock {
        half_result = half_result.filter(product::Column::Stock.gt(0));
    }

    if let Some(min) = params.min {
        half_result = half_result.filter(product::Column::Price.gte(min));
    }

    if let Some(max) = params.max {
        half_result = half_result.filter(product::Column::Price.lte(max));
    }

    let paginator = sort_products(half_result, params.sort.as_deref()).paginate(&*db, limit);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    let now = Utc::now();
    let products: Vec<ProductResponse> = paginator
        .fetch_page(page - 1)
        .await?
        .into_iter()
        .map(|prod| ProductResponse::new(prod, now))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "products": products,
            "page": page,
            "pages": pages,
            "total": total,
        })),
    )
        .into_response())
}

pub(crate) fn sort_products(
    select: Select<ProductEntity>,
    sort: Option<&str>,
) -> Select<ProductEntity> {
    let select = match sort {
        Some("price_asc") => select.order_by_asc(product::Column::Price),
        Some("price_desc") => select.order_by_desc(product::Column::Price),
        Some("rating") => select.order_by_desc(product::Column::Rating),
        Some("name") => select.order_by_asc(product::Column::Name),
        _ => select.order_by_desc(product::Column::CreatedAt),
    };
    select.order_by_asc(product::Column::Id)
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let prod = ProductEntity::find_by_id(id)
        .filter(product::Column::IsActive.eq(true))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No product with {} id was found.", id)))?;

    let category_name = match prod.category_id {
        Some(category_id) => category::Entity::find_by_id(category_id)
            .one(&*db)
            .await?
            .map(|c| c.name),
        None => None,
    };

    let reviews: Vec<ReviewResponse> = review::Entity::find()
        .filter(review::Column::ProductId.eq(id))
        .find_also_related(user::Entity)
        .order_by_desc(review::Column::CreatedAt)
        .all(&*db)
        .await?
        .into_iter()
        .map(|(review, author)| ReviewResponse::new(review, author))
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "product": ProductResponse::new(prod, Utc::now()),
            "category_name": category_name,
            "reviews": reviews,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct GetProductsQuery {
    category: Option<i32>,
    search: Option<String>,
    featured: Option<bool>,
    in_stock: Option<bool>,
    min: Option<f64>,
    max: Option<f64>,
    sort: Option<String>, // "price_asc", "price_desc", "newest", "rating", "name"
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Serialize, Debug)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub brand: Option<String>,
    pub price: f64,
    pub effective_price: f64,
    pub discount_active: bool,
    pub discount_percentage: Option<f64>,
    pub discount_start: Option<DateTime<Utc>>,
    pub discount_end: Option<DateTime<Utc>>,
    pub stock: i32,
    pub category_id: Option<i32>,
    pub image_id: Option<i32>,
    pub requires_prescription: bool,
    pub is_featured: bool,
    pub rating: f64,
    pub num_reviews: i32,
}

impl ProductResponse {
    pub fn new(value: product::Model, now: DateTime<Utc>) -> ProductResponse {
        ProductResponse {
            effective_price: value.effective_price(now),
            discount_active: value.discount_active(now),
            id: value.id,
            name: value.name,
            slug: value.slug,
            description: value.description,
            brand: value.brand,
            price: value.price,
            discount_percentage: value.discount_percentage,
            discount_start: value.discount_start,
            discount_end: value.discount_end,
            stock: value.stock,
            category_id: value.category_id,
            image_id: value.image_id,
            requires_prescription: value.requires_prescription,
            is_featured: value.is_featured,
            rating: value.rating,
            num_reviews: value.num_reviews,
        }
    }
}

#[derive(Serialize)]
struct ReviewResponse {
    id: i32,
    user_id: i32,
    user_name: Option<String>,
    rating: i32,
    comment: String,
    created_at: DateTime<Utc>,
}

impl ReviewResponse {
    fn new(value: review::Model, author: Option<user::Model>) -> ReviewResponse {
        ReviewResponse {
            id: value.id,
            user_id: value.user_id,
            user_name: author.map(|a| a.name),
            rating: value.rating,
            comment: value.comment,
            created_at: value.created_at,
        }
    }
}
